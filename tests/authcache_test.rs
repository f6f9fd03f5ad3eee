//! Credential cache integration tests.

use std::thread;
use wirenet::socket::authcache::{AuthCache, AuthInfo};
use wirenet::CredentialStore;

#[test]
fn test_store_and_retrieve() {
    let cache = AuthCache::new();
    cache.store(AuthInfo::basic("proxy.example.com", "MyRealm", "user", "pass"));

    let entry = cache.find("proxy.example.com", "MyRealm").unwrap();
    assert_eq!(entry.username, "user");
    assert_eq!(entry.password.as_str(), "pass");
}

#[test]
fn test_realms_kept_apart() {
    let cache = AuthCache::new();
    cache.store(AuthInfo::basic("a.com", "admin", "root", "1"));
    cache.store(AuthInfo::basic("a.com", "users", "bob", "2"));

    assert_eq!(cache.find("a.com", "admin").unwrap().username, "root");
    assert_eq!(cache.find("a.com", "users").unwrap().username, "bob");
    assert!(cache.find("b.com", "admin").is_none());
}

#[test]
fn test_last_writer_wins() {
    let cache = AuthCache::new();
    cache.store(AuthInfo::basic("a.com", "R", "old", "1"));
    cache.store(AuthInfo::basic("a.com", "R", "new", "2"));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.find("a.com", "R").unwrap().username, "new");
}

#[test]
fn test_origin_and_proxy_separate() {
    let store = CredentialStore::new();
    store.origin().store(AuthInfo::basic("host", "R", "u", "p"));
    assert!(store.proxy().find("host", "R").is_none());
    assert_eq!(store.origin().len(), 1);
}

#[test]
fn test_concurrent_stores() {
    let store = CredentialStore::new();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                for j in 0..50 {
                    let domain = format!("host{}.test", i);
                    store
                        .origin()
                        .store(AuthInfo::basic(domain.as_str(), format!("realm{}", j), "u", "p"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.origin().len(), 400);
    assert!(store.origin().find_for_domain("host3.test").is_some());
}
