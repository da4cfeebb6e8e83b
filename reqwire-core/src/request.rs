//! Canonical request descriptor.
//!
//! Every requestor method (`get`, `post`, `put`, `delete`, `request`)
//! normalizes its arguments into one [`Request`] before the middleware
//! chain runs. Middleware receive the request by value and may rewrite it
//! before handing it to the next layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Logical request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Read a resource.
    Get,
    /// Create a resource.
    Post,
    /// Replace a resource.
    Put,
    /// Delete a resource.
    Delete,
}

impl Method {
    /// Returns the lowercase method name.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical request descriptor.
///
/// Holds the target `url`, the [`Method`], an optional JSON body and any
/// number of extra fields (headers, params, flags) that middleware or the
/// base requestor may interpret.
///
/// # Example
///
/// ```
/// use reqwire_core::{Method, Request};
/// use serde_json::json;
///
/// let request = Request::post("/users", json!({"name": "alice"}))
///     .with_extra("retryable", json!(true));
///
/// assert_eq!(request.method(), Method::Post);
/// assert_eq!(request.url(), "/users");
/// assert_eq!(request.extra("retryable"), Some(&json!(true)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    url: String,
    method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, flatten)]
    extra: Map<String, Value>,
}

impl Request {
    /// Creates a request without a body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Request {
            url: url.into(),
            method,
            data: None,
            extra: Map::new(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Shorthand for a `POST` request carrying `data`.
    pub fn post(url: impl Into<String>, data: Value) -> Self {
        Self::new(Method::Post, url).with_data(data)
    }

    /// Shorthand for a `PUT` request carrying `data`.
    pub fn put(url: impl Into<String>, data: Value) -> Self {
        Self::new(Method::Put, url).with_data(data)
    }

    /// Shorthand for a `DELETE` request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Sets the request body.
    pub fn with_data(self, data: Value) -> Self {
        Self {
            data: Some(data),
            ..self
        }
    }

    /// Adds an extra field.
    pub fn with_extra(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Returns the target url.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request method.
    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the request body, if any.
    #[inline]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Returns an extra field by name.
    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Returns all extra fields.
    pub fn extras(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Replaces the target url.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Replaces the request method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Replaces the request body.
    pub fn set_data(&mut self, data: Option<Value>) {
        self.data = data;
    }

    /// Inserts or replaces an extra field, returning the previous value.
    pub fn set_extra(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.extra.insert(name.into(), value)
    }

    /// Removes an extra field.
    pub fn remove_extra(&mut self, name: &str) -> Option<Value> {
        self.extra.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_names_are_lowercase() {
        assert_eq!(Method::Get.to_string(), "get");
        assert_eq!(Method::Delete.as_str(), "delete");
    }

    #[test]
    fn test_extra_fields_flatten_into_descriptor() {
        let request = Request::get("/users").with_extra("headers", json!({"x-id": "1"}));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"url": "/users", "method": "get", "headers": {"x-id": "1"}})
        );
        let back: Request = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_setters_rewrite_descriptor() {
        let mut request = Request::get("/users");
        request.set_url("/api/v1/users");
        request.set_extra("token", json!("abc"));
        assert_eq!(request.url(), "/api/v1/users");
        assert_eq!(request.remove_extra("token"), Some(json!("abc")));
        assert!(request.extras().is_empty());
    }
}
