//! Test client: a thin authenticated wrapper over reqwest.

use serde_json::{Value, json};

/// A REST client bound to one test server, optionally carrying a
/// bearer token.
pub struct TestClient {
    http: reqwest::Client,
    base: String,
    pub token: Option<String>,
}

impl TestClient {
    /// Unauthenticated client.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url.to_string(),
            token: None,
        }
    }

    /// Register an account and log in, returning an authenticated client.
    pub async fn register_and_login(base_url: &str, username: &str) -> anyhow::Result<Self> {
        let mut client = Self::new(base_url);

        let resp = client
            .post_json(
                "/api/register",
                &json!({ "username": username, "password": "correct horse battery" }),
            )
            .await?;
        anyhow::ensure!(
            resp.status().as_u16() == 201,
            "register failed: {}",
            resp.status()
        );

        let resp = client
            .post_json(
                "/api/login",
                &json!({ "username": username, "password": "correct horse battery" }),
            )
            .await?;
        anyhow::ensure!(
            resp.status().is_success(),
            "login failed: {}",
            resp.status()
        );
        let body: Value = resp.json().await?;
        client.token = Some(
            body["token"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("login response missing token"))?
                .to_string(),
        );

        Ok(client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<reqwest::Response> {
        Ok(self.auth(self.http.get(self.url(path))).send().await?)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .auth(self.http.post(self.url(path)))
            .json(body)
            .send()
            .await?)
    }

    /// POST with no body (upload complete without material metadata).
    pub async fn post_empty(&self, path: &str) -> anyhow::Result<reqwest::Response> {
        Ok(self.auth(self.http.post(self.url(path))).send().await?)
    }

    pub async fn patch_json(&self, path: &str, body: &Value) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .auth(self.http.patch(self.url(path)))
            .json(body)
            .send()
            .await?)
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .auth(self.http.put(self.url(path)))
            .json(body)
            .send()
            .await?)
    }

    pub async fn put_bytes(&self, path: &str, body: Vec<u8>) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .auth(self.http.put(self.url(path)))
            .body(body)
            .send()
            .await?)
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<reqwest::Response> {
        Ok(self.auth(self.http.delete(self.url(path))).send().await?)
    }

    pub async fn delete_json(
        &self,
        path: &str,
        body: &Value,
    ) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .auth(self.http.delete(self.url(path)))
            .json(body)
            .send()
            .await?)
    }

    /// GET and parse the JSON body, asserting a 200.
    pub async fn get_ok(&self, path: &str) -> anyhow::Result<Value> {
        let resp = self.get(path).await?;
        anyhow::ensure!(
            resp.status().is_success(),
            "GET {path} failed: {}",
            resp.status()
        );
        Ok(resp.json().await?)
    }
}
