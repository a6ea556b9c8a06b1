use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter: returns `true` while the caller is under
    /// `limit` requests in the current `window_seconds` window.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: u64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // INCR and EXPIRE must be atomic or a crashed request could leave an
        // immortal counter.
        let script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return current
            "#,
        );

        let count: i64 = script
            .key(key)
            .arg(window_seconds)
            .invoke_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}
