// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory Kubernetes API for tests.
//!
//! `FakeApiServer` is a `tower::Service` plugged into `kube::Client::new`. It keeps
//! objects in a map keyed by their URL path and understands just enough of the API
//! for the agent: create (409 on duplicates), get, list with `labelSelector`,
//! replace, server-side apply (merge), and delete. Every request is logged so tests
//! can assert on the writes a reconciliation performed.

use chrono::{SecondsFormat, Utc};
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// Last path segments that name a collection rather than an object
const COLLECTIONS: &[&str] = &[
    "appprojects",
    "applications",
    "argocds",
    "clusterrolebindings",
    "configmaps",
    "customresourcedefinitions",
    "deployments",
    "namespaces",
    "pods",
    "secrets",
    "serviceaccounts",
    "services",
    "statefulsets",
];

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Value>,
    failures: BTreeMap<(String, String), u16>,
    requests: Vec<(String, String)>,
    next_uid: u64,
}

#[derive(Clone, Default)]
pub struct FakeApiServer {
    state: Arc<Mutex<State>>,
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a kube Client backed by this server
    pub fn client(&self) -> Client {
        Client::new(self.clone(), "default")
    }

    /// Store a typed object as if it had been created earlier
    pub fn seed<K>(&self, obj: &K)
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let path = format!(
            "{}/{}",
            K::url_path(&(), obj.namespace().as_deref()),
            obj.name_any()
        );
        let value = serde_json::to_value(obj).expect("object serialises");
        let mut state = self.state.lock().unwrap();
        let value = state.stamp(&path, value);
        state.objects.insert(path, value);
    }

    /// Store an arbitrary JSON document at an exact path
    pub fn insert_raw(&self, path: &str, value: Value) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(path.to_string(), value);
    }

    /// Answer every `method` request on `path` with an error status
    pub fn fail(&self, method: &str, path: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((method.to_string(), path.to_string()), status);
    }

    /// Fetch a stored object
    pub fn get<K>(&self, namespace: Option<&str>, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + serde::de::DeserializeOwned,
    {
        let path = format!("{}/{}", K::url_path(&(), namespace), name);
        self.get_raw(&path)
            .map(|v| serde_json::from_value(v).expect("stored object deserialises"))
    }

    pub fn get_raw(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    /// Number of objects stored directly below a collection path
    pub fn object_count(&self, collection: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.children(collection).count()
    }

    /// Number of requests seen for an exact method and path
    pub fn count_requests(&self, method: &str, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(m, p)| m == method && p == path)
            .count()
    }

    /// Every request that was not a read
    pub fn writes(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(m, _)| m != "GET")
            .cloned()
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }
}

impl State {
    fn children<'a>(&'a self, collection: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        let prefix = format!("{}/", collection);
        self.objects
            .iter()
            .filter(move |(k, _)| k.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/')))
            .map(|(_, v)| v)
    }

    /// Fill in the server-managed metadata of a new object
    fn stamp(&mut self, path: &str, mut value: Value) -> Value {
        self.next_uid += 1;
        let uid = format!("uid-{}", self.next_uid);
        if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            if let Some(ns) = namespace_of(path) {
                meta.insert("namespace".to_string(), json!(ns));
            }
            meta.entry("uid").or_insert(json!(uid));
            meta.entry("resourceVersion").or_insert(json!("1"));
            meta.entry("creationTimestamp")
                .or_insert(json!(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        value
    }

    fn handle(&mut self, method: &str, path: &str, query: &str, body: &[u8]) -> (u16, Value) {
        self.requests.push((method.to_string(), path.to_string()));

        if let Some(code) = self.failures.get(&(method.to_string(), path.to_string())) {
            return (*code, status(*code, "InternalError", "injected failure"));
        }

        let params: BTreeMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        match method {
            "GET" => self.handle_get(path, params.get("labelSelector")),
            "POST" => self.handle_create(path, body),
            "PUT" => self.handle_replace(path, body),
            "PATCH" => self.handle_apply(path, body),
            "DELETE" => match self.objects.remove(path) {
                Some(obj) => (200, obj),
                None => not_found(path),
            },
            _ => (405, status(405, "MethodNotAllowed", method)),
        }
    }

    fn handle_get(&self, path: &str, selector: Option<&String>) -> (u16, Value) {
        if let Some(obj) = self.objects.get(path) {
            return (200, obj.clone());
        }
        if !is_collection(path) {
            return not_found(path);
        }

        let wanted = selector.map(|s| parse_selector(s)).unwrap_or_default();
        let items: Vec<Value> = self
            .children(path)
            .filter(|obj| matches_labels(obj, &wanted))
            .cloned()
            .collect();

        (
            200,
            json!({
                "apiVersion": "v1",
                "kind": "List",
                "metadata": {"resourceVersion": ""},
                "items": items,
            }),
        )
    }

    fn handle_create(&mut self, collection: &str, body: &[u8]) -> (u16, Value) {
        let Ok(obj) = serde_json::from_slice::<Value>(body) else {
            return (400, status(400, "BadRequest", "invalid body"));
        };
        let Some(name) = obj["metadata"]["name"].as_str().map(str::to_string) else {
            return (422, status(422, "Invalid", "metadata.name is required"));
        };

        let path = format!("{}/{}", collection, name);
        if self.objects.contains_key(&path) {
            return (
                409,
                status(409, "AlreadyExists", &format!("{} already exists", name)),
            );
        }

        let obj = self.stamp(&path, obj);
        self.objects.insert(path, obj.clone());
        (201, obj)
    }

    fn handle_replace(&mut self, path: &str, body: &[u8]) -> (u16, Value) {
        let Ok(mut obj) = serde_json::from_slice::<Value>(body) else {
            return (400, status(400, "BadRequest", "invalid body"));
        };
        let Some(existing) = self.objects.get(path) else {
            return not_found(path);
        };

        for key in ["uid", "creationTimestamp", "namespace"] {
            if let Some(v) = existing["metadata"].get(key) {
                obj["metadata"][key] = v.clone();
            }
        }
        self.objects.insert(path.to_string(), obj.clone());
        (200, obj)
    }

    fn handle_apply(&mut self, path: &str, body: &[u8]) -> (u16, Value) {
        let Ok(patch) = serde_json::from_slice::<Value>(body) else {
            return (400, status(400, "BadRequest", "invalid body"));
        };

        match self.objects.get_mut(path) {
            Some(existing) => {
                merge(existing, &patch);
                (200, existing.clone())
            }
            None => {
                let obj = self.stamp(path, patch);
                self.objects.insert(path.to_string(), obj.clone());
                (201, obj)
            }
        }
    }
}

fn is_collection(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|last| COLLECTIONS.contains(&last))
}

fn namespace_of(path: &str) -> Option<&str> {
    let segments: Vec<&str> = path.split('/').collect();
    segments
        .iter()
        .position(|s| *s == "namespaces")
        .filter(|i| i + 2 < segments.len())
        .map(|i| segments[i + 1])
}

fn parse_selector(selector: &str) -> Vec<(String, String)> {
    selector
        .split(',')
        .filter_map(|term| term.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim_start_matches('=').trim().to_string()))
        .collect()
}

fn matches_labels(obj: &Value, wanted: &[(String, String)]) -> bool {
    wanted
        .iter()
        .all(|(k, v)| obj["metadata"]["labels"][k].as_str() == Some(v.as_str()))
}

/// JSON merge patch: objects merge recursively, `null` removes, everything else replaces
fn merge(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (k, v) in patch {
                if v.is_null() {
                    target.remove(k);
                } else {
                    merge(target.entry(k.clone()).or_insert(Value::Null), v);
                }
            }
        }
        _ => *target = patch.clone(),
    }
}

fn status(code: u16, reason: &str, message: &str) -> Value {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
}

fn not_found(path: &str) -> (u16, Value) {
    (404, status(404, "NotFound", &format!("{} not found", path)))
}

impl Service<Request<Body>> for FakeApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let method = req.method().to_string();
            let path = req.uri().path().trim_end_matches('/').to_string();
            let query = req.uri().query().unwrap_or_default().to_string();
            let body = req.into_body().collect().await?.to_bytes();

            let (code, value) = state.lock().unwrap().handle(&method, &path, &query, &body);

            let response = Response::builder()
                .status(code)
                .header("content-type", "application/json")
                .body(Body::from(value.to_string().into_bytes()))?;
            Ok::<_, tower::BoxError>(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_collection() {
        assert!(is_collection("/api/v1/namespaces/syn/secrets"));
        assert!(!is_collection("/api/v1/namespaces/syn/secrets/argo-ssh-key"));
        assert!(!is_collection("/version"));
    }

    #[test]
    fn test_namespace_of() {
        assert_eq!(namespace_of("/api/v1/namespaces/syn/secrets/x"), Some("syn"));
        assert_eq!(namespace_of("/api/v1/namespaces/syn/secrets"), Some("syn"));
        assert_eq!(namespace_of("/api/v1/namespaces/syn"), None);
        assert_eq!(namespace_of("/apis/apiextensions.k8s.io/v1/customresourcedefinitions/x"), None);
    }

    #[test]
    fn test_merge() {
        let mut target = json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge(&mut target, &json!({"b": {"c": 4, "d": null}, "e": 5}));
        assert_eq!(target, json!({"a": 1, "b": {"c": 4}, "e": 5}));
    }
}
