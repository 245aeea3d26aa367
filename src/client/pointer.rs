use std::sync::{Arc, Mutex};

use reqwest::cookie::{CookieStore, Jar};
use url::Url;

/// The session-scoped copy of the current-site pointer: the value the
/// server reads on every request.
pub trait SessionPointer: Send + Sync {
    fn get(&self) -> Option<String>;
    /// Overwrite the pointer; `None` clears it.
    fn set(&self, site_id: Option<&str>);
}

/// Pointer stored as a cookie in the jar the HTTP client sends from.
pub struct CookiePointer {
    jar: Arc<Jar>,
    url: Url,
    name: String,
    max_age_seconds: i64,
}

impl CookiePointer {
    pub fn new(jar: Arc<Jar>, url: Url, name: impl Into<String>, max_age_seconds: i64) -> Self {
        Self {
            jar,
            url,
            name: name.into(),
            max_age_seconds,
        }
    }
}

impl SessionPointer for CookiePointer {
    fn get(&self) -> Option<String> {
        let header = self.jar.cookies(&self.url)?;
        let cookies = header.to_str().ok()?;
        cookies
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
    }

    fn set(&self, site_id: Option<&str>) {
        let cookie = match site_id {
            Some(id) => format!(
                "{}={}; Path=/; Max-Age={}; SameSite=Lax",
                self.name, id, self.max_age_seconds
            ),
            // An expired cookie evicts the stored one.
            None => format!("{}=; Path=/; Max-Age=0", self.name),
        };
        self.jar.add_cookie_str(&cookie, &self.url);
    }
}

/// In-process pointer for sessions that do not talk HTTP.
#[derive(Default)]
pub struct MemoryPointer {
    value: Mutex<Option<String>>,
}

impl MemoryPointer {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }
}

impl SessionPointer for MemoryPointer {
    fn get(&self) -> Option<String> {
        let guard = self.value.lock().unwrap_or_else(|p| p.into_inner());
        guard.clone()
    }

    fn set(&self, site_id: Option<&str>) {
        let mut guard = self.value.lock().unwrap_or_else(|p| p.into_inner());
        *guard = site_id.map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer() -> (Arc<Jar>, CookiePointer) {
        let jar = Arc::new(Jar::default());
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        let pointer = CookiePointer::new(jar.clone(), url, "current_site_id", 3600);
        (jar, pointer)
    }

    #[test]
    fn cookie_pointer_writes_and_clears() {
        let (jar, pointer) = pointer();
        assert_eq!(pointer.get(), None);

        pointer.set(Some("site-a"));
        assert_eq!(pointer.get().as_deref(), Some("site-a"));

        pointer.set(Some("site-b"));
        assert_eq!(pointer.get().as_deref(), Some("site-b"));
        let header = jar
            .cookies(&Url::parse("http://127.0.0.1:8080/api/sites").unwrap())
            .unwrap();
        assert_eq!(header.to_str().unwrap(), "current_site_id=site-b");

        pointer.set(None);
        assert_eq!(pointer.get(), None);
    }

    #[test]
    fn cookie_pointer_ignores_other_cookies() {
        let (jar, pointer) = pointer();
        jar.add_cookie_str("theme=dark; Path=/", &Url::parse("http://127.0.0.1:8080/").unwrap());
        assert_eq!(pointer.get(), None);
        pointer.set(Some("site-a"));
        assert_eq!(pointer.get().as_deref(), Some("site-a"));
    }

    #[test]
    fn memory_pointer_round_trip() {
        let pointer = MemoryPointer::default();
        pointer.set(Some("x"));
        assert_eq!(pointer.get().as_deref(), Some("x"));
        pointer.set(None);
        assert_eq!(pointer.get(), None);
    }
}
