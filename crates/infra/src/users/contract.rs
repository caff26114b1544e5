//! Behaviour every `UserStore` backend must share.

use turnstile_core::{UserRecord, UserStore, UserStoreError};

fn record(username: &str, email: &str, role: &str) -> UserRecord {
    let mut user = UserRecord::new(username, email).with_role(role);
    user.password_hash = format!("hash-of-{username}").into_bytes();
    user
}

fn sorted(mut users: Vec<UserRecord>) -> Vec<UserRecord> {
    users.sort_by(|a, b| a.username.cmp(&b.username));
    users
}

pub(crate) async fn exercise(store: &dyn UserStore) {
    let alice = record("alice", "alice@x.com", "user");
    let bob = record("bob", "bob@x.com", "admin");

    store.save(alice.clone()).await.unwrap();
    store.save(bob.clone()).await.unwrap();

    assert_eq!(store.get("alice").await.unwrap(), alice);
    assert_eq!(
        store.get("carol").await,
        Err(UserStoreError::NotFound("carol".into()))
    );
    assert_eq!(
        sorted(store.list().await.unwrap()),
        vec![alice.clone(), bob.clone()]
    );

    let moved = record("alice", "alice@new.com", "admin");
    store.save(moved.clone()).await.unwrap();
    assert_eq!(store.get("alice").await.unwrap(), moved);
    assert_eq!(store.list().await.unwrap().len(), 2);

    store.delete("alice").await.unwrap();
    assert_eq!(
        store.delete("alice").await,
        Err(UserStoreError::DeleteOfMissing("alice".into()))
    );
    assert!(store.get("alice").await.unwrap_err().is_not_found());
    assert_eq!(store.list().await.unwrap(), vec![bob]);

    store.close().await;
    store.close().await;
}
