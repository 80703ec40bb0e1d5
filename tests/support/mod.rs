#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use session_tokens::auth::{
    BlacklistStore, Identity, IdentityStore, OutstandingToken, TokenBackend, TokenContext, UserId,
};
use session_tokens::clock::ManualClock;

pub const SECRET: &str = "test-secret-key-at-least-32-characters-long";
pub const NOW: i64 = 1_700_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub active: bool,
}

impl TestUser {
    pub fn new(id: i64, username: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            active: true,
        }
    }
}

impl Identity for TestUser {
    fn id(&self) -> UserId {
        UserId::Int(self.id)
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Users shared between the test and the app under test
#[derive(Clone, Default)]
pub struct InMemoryUsers {
    users: Arc<RwLock<HashMap<UserId, TestUser>>>,
}

impl InMemoryUsers {
    pub fn with(users: Vec<TestUser>) -> Self {
        let store = Self::default();
        for user in users {
            store.insert(user);
        }
        store
    }

    pub fn insert(&self, user: TestUser) {
        self.users.write().unwrap().insert(user.id(), user);
    }

    pub fn set_active(&self, id: i64, active: bool) {
        if let Some(user) = self.users.write().unwrap().get_mut(&UserId::Int(id)) {
            user.active = active;
        }
    }
}

impl IdentityStore for InMemoryUsers {
    type User = TestUser;

    fn find_by_id(&self, id: &UserId) -> Option<TestUser> {
        self.users.read().unwrap().get(id).cloned()
    }
}

#[derive(Default)]
pub struct InMemoryBlacklist {
    outstanding: RwLock<HashMap<String, OutstandingToken>>,
    blacklisted: RwLock<HashSet<String>>,
}

impl InMemoryBlacklist {
    pub fn outstanding(&self, jti: &str) -> Option<OutstandingToken> {
        self.outstanding.read().unwrap().get(jti).cloned()
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.read().unwrap().len()
    }
}

impl BlacklistStore for InMemoryBlacklist {
    fn is_blacklisted(&self, jti: &str) -> bool {
        self.blacklisted.read().unwrap().contains(jti)
    }

    fn record_outstanding(&self, token: OutstandingToken) {
        self.outstanding
            .write()
            .unwrap()
            .entry(token.jti.clone())
            .or_insert(token);
    }

    fn blacklist(&self, token: OutstandingToken) -> bool {
        let jti = token.jti.clone();
        self.record_outstanding(token);
        self.blacklisted.write().unwrap().insert(jti)
    }
}

pub struct TestContext {
    pub context: Arc<TokenContext>,
    pub clock: Arc<ManualClock>,
}

pub fn test_context(configure: impl FnOnce(TokenContext) -> TokenContext) -> TestContext {
    let clock = Arc::new(ManualClock::at_epoch(NOW));
    let backend = TokenBackend::hmac("HS256", SECRET).expect("Failed to build backend");
    let context = configure(TokenContext::new(backend).with_clock(clock.clone()));

    TestContext {
        context: Arc::new(context),
        clock,
    }
}
