//! Configuration access port trait.

/// Typed lookups over `[section] key = value` configuration.
///
/// Missing or unparsable numeric values fall back to `default`; callers that
/// need to tell the two apart read the raw string first.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
