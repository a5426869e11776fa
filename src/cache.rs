use redis::Client;

/// Read-through cache over redis. Keys are namespaced with a configurable
/// prefix so several instances (or test runs) can share one server.
#[derive(Clone)]
pub struct Cache {
    client: Client,
    key_prefix: String,
}

impl Cache {
    pub fn new(client: Client, key_prefix: String) -> Cache {
        Cache { client, key_prefix }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut redis_conn = self.client.get_tokio_connection().await?;

        redis::cmd("GET")
            .arg(self.namespaced(key))
            .query_async(&mut redis_conn)
            .await
    }

    pub async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: usize,
    ) -> Result<(), redis::RedisError> {
        let mut redis_conn = self.client.get_tokio_connection().await?;

        redis::cmd("SET")
            .arg(self.namespaced(key))
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut redis_conn)
            .await
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}
