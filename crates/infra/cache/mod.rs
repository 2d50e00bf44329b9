pub mod redis_status_cache;
