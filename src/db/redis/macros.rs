/// Read-through caching on top of `Cache`
///
/// Evaluates to an `AppResult`. On a hit the cached value is returned. On a
/// miss `$compute` is awaited and a successful value is queued for a
/// background write with `$ttl` seconds to live. A failed read only logs and
/// counts as a miss.
///
/// ```rust,ignore
/// let response: SearchResponse = cached!(cache, key, 3600, lookup)?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $compute:expr) => {{
        let key = $key;
        let hit = $cache.get_from_cache(&key).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, key = %key, "Cache read failed, treating as miss");
            None
        });

        match hit {
            Some(value) => Ok(value),
            None => $compute.await.inspect(|value| {
                $cache.set_in_background(&key, value, $ttl);
            }),
        }
    }};
}
