//! Incoming request type.
//!
//! A [`Request`] is built once per invocation from an [`InvocationEvent`].
//! Body fields, query parameters and path parameters are merged into one
//! parameter store with a fixed precedence:
//!
//! ```text
//! body  >  query  >  path
//! ```
//!
//! Sources are merged in that order and a later source never replaces a key
//! an earlier one already supplied. After construction the store changes
//! only through [`Request::add`], [`Request::add_overwrite`] and
//! [`Request::add_multiple`].

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::event::InvocationEvent;
use crate::method::Method;

/// An incoming request, parsed from the platform event.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    resource: String,
    headers: HashMap<String, String>,
    path_parameters: HashMap<String, String>,
    query_parameters: HashMap<String, String>,
    stage_variables: HashMap<String, String>,
    request_context: Value,
    raw_body: Option<String>,
    body: Option<Value>,
    params: HashMap<String, Value>,
}

impl Request {
    /// Builds a request from an event.
    ///
    /// Absent maps become empty maps. A non-empty body must be valid JSON,
    /// otherwise this fails with [`Error::MalformedBody`].
    pub fn from_event(event: InvocationEvent) -> Result<Self> {
        let headers = event.headers.unwrap_or_default();
        let path_parameters = event.path_parameters.unwrap_or_default();
        let query_parameters = event.query_string_parameters.unwrap_or_default();
        let stage_variables = event.stage_variables.unwrap_or_default();

        let raw_body = event.body.filter(|b| !b.is_empty());
        let body = raw_body
            .as_deref()
            .map(|b| serde_json::from_str::<Value>(b))
            .transpose()
            .map_err(Error::MalformedBody)?;

        let mut params = HashMap::new();
        if let Some(Value::Object(fields)) = &body {
            params.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        for (k, v) in query_parameters.iter().chain(path_parameters.iter()) {
            params.entry(k.clone()).or_insert_with(|| Value::String(v.clone()));
        }

        Ok(Self {
            method: event.http_method,
            path: event.path,
            resource: event.resource,
            headers,
            path_parameters,
            query_parameters,
            stage_variables,
            request_context: event.request_context.unwrap_or(Value::Null),
            raw_body,
            body,
            params,
        })
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn resource(&self) -> &str { &self.resource }
    pub fn headers(&self) -> &HashMap<String, String> { &self.headers }
    pub fn path_parameters(&self) -> &HashMap<String, String> { &self.path_parameters }
    pub fn query_parameters(&self) -> &HashMap<String, String> { &self.query_parameters }
    pub fn request_context(&self) -> &Value { &self.request_context }
    pub fn raw_body(&self) -> Option<&str> { self.raw_body.as_deref() }

    /// The merged parameter store.
    pub fn params(&self) -> &HashMap<String, Value> { &self.params }

    pub fn stage_variable(&self, key: &str) -> Option<&str> {
        self.stage_variables.get(key).map(String::as_str)
    }

    /// Returns the merged parameter for `key`, or `None` if no source has it.
    ///
    /// A stored JSON `null` is `Some(&Value::Null)`, never confused with a miss.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Like [`get`](Self::get), failing with [`Error::KeyNotFound`] on a miss.
    pub fn get_or_fail(&self, key: &str) -> Result<&Value> {
        self.params.get(key).ok_or_else(|| Error::key_not_found(key))
    }

    /// Header lookup.
    ///
    /// Tries the name exactly as given first, then falls back to an ASCII
    /// case-insensitive match since clients choose their own casing.
    pub fn header(&self, key: &str) -> Result<&str> {
        self.headers
            .get(key)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
            .ok_or_else(|| Error::key_not_found(key))
    }

    /// Deserializes the whole JSON body into `T`.
    ///
    /// A request without a body deserializes from `null`, so `Option<T>`
    /// targets accept it.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self.body.clone().unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(Error::MalformedBody)
    }

    /// Injects a parameter. Fails with [`Error::KeyAlreadyExists`] if `key`
    /// is already present, leaving the stored value untouched.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        if self.params.contains_key(&key) {
            return Err(Error::key_already_exists(&key));
        }
        self.params.insert(key, value.into());
        Ok(())
    }

    /// Injects a parameter, replacing any existing value.
    pub fn add_overwrite(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    /// Injects every pair or none of them.
    ///
    /// Any key that already exists, or that repeats within `entries`, fails
    /// the whole batch with [`Error::KeyAlreadyExists`].
    pub fn add_multiple<K, V, I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let entries: Vec<(String, Value)> =
            entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

        {
            let mut seen = HashSet::with_capacity(entries.len());
            for (key, _) in &entries {
                if self.params.contains_key(key) || !seen.insert(key.as_str()) {
                    return Err(Error::key_already_exists(key));
                }
            }
        }

        self.params.extend(entries);
        Ok(())
    }

    /// Binds path parameters captured by the router.
    ///
    /// They sit at path precedence: values already present, from the event
    /// or from a higher-precedence source, are kept.
    pub(crate) fn bind_path_parameters<'a>(
        &mut self,
        bound: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        for (k, v) in bound {
            self.path_parameters.entry(k.to_owned()).or_insert_with(|| v.to_owned());
            self.params
                .entry(k.to_owned())
                .or_insert_with(|| Value::String(v.to_owned()));
        }
    }
}

impl TryFrom<InvocationEvent> for Request {
    type Error = Error;

    fn try_from(event: InvocationEvent) -> Result<Self> {
        Self::from_event(event)
    }
}
