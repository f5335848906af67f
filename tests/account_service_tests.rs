//! AccountService tests
//!
//! Registration, login, admin provisioning and API key management.

use std::sync::Arc;

use chrono::{Duration, Utc};

use linkhub::auth::{AuthScheme, Identity, JwtService, Plan, Role};
use linkhub::config::AuthSettings;
use linkhub::errors::LinkhubError;
use linkhub::services::{AccountService, CreateUserRequest};
use linkhub::storage::{MemoryStorage, NewUser, OwnerRef, User, UserRepository};
use linkhub::utils::{ALPHABET, CodeSource};

const SECRET: &str = "account-tests-secret-0123456789";

struct FixedKey(&'static str);

impl CodeSource for FixedKey {
    fn next_code(&self, _length: usize) -> String {
        self.0.to_string()
    }
}

struct Fixture {
    storage: Arc<MemoryStorage>,
    jwt: Arc<JwtService>,
    accounts: AccountService,
}

fn setup() -> Fixture {
    let storage = Arc::new(MemoryStorage::new());
    let jwt = Arc::new(JwtService::new(SECRET, 60));
    let accounts = AccountService::new(storage.clone(), jwt.clone(), AuthSettings::default());
    Fixture {
        storage,
        jwt,
        accounts,
    }
}

async fn seed(storage: &MemoryStorage, email: &str, role: Role) -> User {
    storage
        .create_user(NewUser {
            email: email.to_string(),
            password_hash: None,
            plan: Plan::Free,
            role,
            plan_expires_at: None,
            created_at: Utc::now(),
        })
        .await
        .expect("seed user")
}

fn identity(user: &User) -> Identity {
    Identity {
        user_id: user.id,
        email: user.email.clone(),
        owner: OwnerRef::account(user.id),
        capabilities: user.capabilities(),
        scheme: AuthScheme::Bearer,
    }
}

// =============================================================================
// Registration and login
// =============================================================================

#[tokio::test]
async fn test_register_creates_free_user_with_token() {
    let f = setup();

    let session = f.accounts.register("a@x.com", "secret1").await.unwrap();
    assert_eq!(session.user.id, 1);
    assert_eq!(session.user.plan, Plan::Free);
    assert_eq!(session.user.role, Role::User);
    assert!(session.user.password_hash.is_some());

    let claims = f.jwt.validate_token(&session.token).unwrap();
    assert_eq!(claims.user_id().unwrap(), 1);
    assert_eq!(claims.email, "a@x.com");
}

#[tokio::test]
async fn test_register_normalizes_and_rejects_duplicates() {
    let f = setup();

    let session = f.accounts.register("  Mixed@Example.COM ", "secret1").await.unwrap();
    assert_eq!(session.user.email, "mixed@example.com");

    let err = f
        .accounts
        .register("mixed@example.com", "another1")
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::Conflict(_)));
}

#[tokio::test]
async fn test_register_validates_input() {
    let f = setup();

    let bad_email = f.accounts.register("not-an-email", "secret1").await.unwrap_err();
    assert!(matches!(bad_email, LinkhubError::Validation(_)));

    let short = f.accounts.register("a@x.com", "12345").await.unwrap_err();
    assert!(matches!(short, LinkhubError::Validation(_)));
}

#[tokio::test]
async fn test_email_reusable_after_account_deletion() {
    let f = setup();
    let admin = seed(&f.storage, "root@x.com", Role::Admin).await;

    let first = f.accounts.register("a@x.com", "secret1").await.unwrap();
    f.accounts
        .soft_delete_user(&identity(&admin), first.user.id)
        .await
        .unwrap();

    let second = f.accounts.register("a@x.com", "secret2").await.unwrap();
    assert_ne!(second.user.id, first.user.id);
}

#[tokio::test]
async fn test_login() {
    let f = setup();
    f.accounts.register("a@x.com", "secret1").await.unwrap();

    let session = f.accounts.login("A@X.com", "secret1").await.unwrap();
    assert_eq!(session.user.email, "a@x.com");
    assert!(f.jwt.validate_token(&session.token).is_ok());

    for (email, password) in [("a@x.com", "wrong-pass"), ("nobody@x.com", "secret1")] {
        let err = f.accounts.login(email, password).await.unwrap_err();
        assert!(matches!(err, LinkhubError::Unauthorized(_)));
    }
}

#[tokio::test]
async fn test_login_without_password_is_rejected() {
    let f = setup();
    seed(&f.storage, "nopass@x.com", Role::User).await;

    let err = f.accounts.login("nopass@x.com", "").await.unwrap_err();
    assert!(matches!(err, LinkhubError::Unauthorized(_)));
}

#[tokio::test]
async fn test_login_with_malformed_stored_hash_is_rejected() {
    let f = setup();
    f.storage
        .create_user(NewUser {
            email: "legacy@x.com".to_string(),
            password_hash: Some("secret1".to_string()),
            plan: Plan::Free,
            role: Role::User,
            plan_expires_at: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    // 明文存储的值不能当作密码匹配
    let err = f.accounts.login("legacy@x.com", "secret1").await.unwrap_err();
    assert!(matches!(err, LinkhubError::Unauthorized(_)), "{err:?}");
}

// =============================================================================
// API keys
// =============================================================================

#[tokio::test]
async fn test_create_api_key_for_self() {
    let f = setup();
    let user = seed(&f.storage, "a@x.com", Role::User).await;

    let issued = f
        .accounts
        .create_api_key(&identity(&user), user.id)
        .await
        .unwrap();
    assert_eq!(issued.user_id, user.id);
    assert_eq!(issued.key.len(), 32);
    assert!(issued.key.bytes().all(|b| ALPHABET.contains(&b)));

    let stored = f.storage.get_api_key(&issued.key).await.unwrap().unwrap();
    assert_eq!(stored.id, issued.id);
}

#[tokio::test]
async fn test_create_api_key_for_other_user_needs_admin() {
    let f = setup();
    let alice = seed(&f.storage, "alice@x.com", Role::User).await;
    let bob = seed(&f.storage, "bob@x.com", Role::User).await;
    let admin = seed(&f.storage, "root@x.com", Role::Admin).await;

    let err = f
        .accounts
        .create_api_key(&identity(&alice), bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::Forbidden(_)));

    let issued = f
        .accounts
        .create_api_key(&identity(&admin), bob.id)
        .await
        .unwrap();
    assert_eq!(issued.user_id, bob.id);

    let err = f
        .accounts
        .create_api_key(&identity(&admin), 999)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::NotFound(_)));
}

#[tokio::test]
async fn test_create_api_key_retries_exhausted() {
    let f = setup();
    let user = seed(&f.storage, "a@x.com", Role::User).await;
    let accounts = AccountService::new(f.storage.clone(), f.jwt.clone(), AuthSettings::default())
        .with_code_source(Arc::new(FixedKey("always-the-same-key")));

    accounts.create_api_key(&identity(&user), user.id).await.unwrap();
    let err = accounts
        .create_api_key(&identity(&user), user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::RetriesExhausted(_)));
    assert_eq!(f.storage.list_api_keys(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_api_keys_is_masked() {
    let f = setup();
    let user = seed(&f.storage, "a@x.com", Role::User).await;
    let caller = identity(&user);

    let issued = f.accounts.create_api_key(&caller, user.id).await.unwrap();
    f.accounts.create_api_key(&caller, user.id).await.unwrap();

    let keys = f.accounts.list_api_keys(&caller).await.unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].id, issued.id);
    assert!(keys[0].masked_key.starts_with(&issued.key[..6]));
    assert!(!keys[0].masked_key.contains(&issued.key));
}

#[tokio::test]
async fn test_revoke_api_key() {
    let f = setup();
    let alice = seed(&f.storage, "alice@x.com", Role::User).await;
    let bob = seed(&f.storage, "bob@x.com", Role::User).await;

    let issued = f
        .accounts
        .create_api_key(&identity(&alice), alice.id)
        .await
        .unwrap();

    let err = f
        .accounts
        .revoke_api_key(&identity(&bob), issued.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::Unauthorized(_)));
    assert!(f.storage.get_api_key(&issued.key).await.unwrap().is_some());

    f.accounts
        .revoke_api_key(&identity(&alice), issued.id)
        .await
        .unwrap();
    assert!(f.storage.get_api_key(&issued.key).await.unwrap().is_none());

    let err = f
        .accounts
        .revoke_api_key(&identity(&alice), issued.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::NotFound(_)));
}

// =============================================================================
// Admin operations
// =============================================================================

#[tokio::test]
async fn test_create_user_is_admin_gated() {
    let f = setup();
    let user = seed(&f.storage, "a@x.com", Role::User).await;
    let admin = seed(&f.storage, "root@x.com", Role::Admin).await;

    let req = CreateUserRequest {
        email: "new@x.com".to_string(),
        password: Some("secret1".to_string()),
        plan: Plan::Pro,
        role: Role::User,
        plan_expires_at: Some(Utc::now() + Duration::days(30)),
    };

    let err = f
        .accounts
        .create_user(&identity(&user), req.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::Forbidden(_)));

    let created = f
        .accounts
        .create_user(&identity(&admin), req.clone())
        .await
        .unwrap();
    assert_eq!(created.user.plan, Plan::Pro);
    assert!(created.token.is_some());

    let dup = f
        .accounts
        .create_user(&identity(&admin), req)
        .await
        .unwrap_err();
    assert!(matches!(dup, LinkhubError::Conflict(_)));
}

#[tokio::test]
async fn test_create_user_without_password_gets_no_token() {
    let f = setup();
    let admin = seed(&f.storage, "root@x.com", Role::Admin).await;

    let created = f
        .accounts
        .create_user(
            &identity(&admin),
            CreateUserRequest {
                email: "svc@x.com".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(created.token.is_none());
    assert!(created.user.password_hash.is_none());
}

#[tokio::test]
async fn test_update_plan() {
    let f = setup();
    let user = seed(&f.storage, "a@x.com", Role::User).await;
    let admin = seed(&f.storage, "root@x.com", Role::Admin).await;
    let expiry = Utc::now() + Duration::days(7);

    let err = f
        .accounts
        .update_plan(&identity(&user), user.id, Plan::Pro, Some(expiry))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::Forbidden(_)));

    let updated = f
        .accounts
        .update_plan(&identity(&admin), user.id, Plan::Pro, Some(expiry))
        .await
        .unwrap();
    assert_eq!(updated.plan, Plan::Pro);
    assert_eq!(updated.plan_expires_at, Some(expiry));
    assert!(updated.updated_at.is_some());

    let err = f
        .accounts
        .update_plan(&identity(&admin), 999, Plan::Pro, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::NotFound(_)));
}

#[tokio::test]
async fn test_soft_delete_user_revokes_keys() {
    let f = setup();
    let user = seed(&f.storage, "a@x.com", Role::User).await;
    let admin = seed(&f.storage, "root@x.com", Role::Admin).await;
    let issued = f
        .accounts
        .create_api_key(&identity(&user), user.id)
        .await
        .unwrap();

    let err = f
        .accounts
        .soft_delete_user(&identity(&user), admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::Forbidden(_)));

    f.accounts
        .soft_delete_user(&identity(&admin), user.id)
        .await
        .unwrap();
    assert!(f.storage.get_user_by_id(user.id).await.unwrap().is_none());
    assert!(f.storage.get_api_key(&issued.key).await.unwrap().is_none());

    let err = f
        .accounts
        .soft_delete_user(&identity(&admin), user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::NotFound(_)));
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let f = setup();
    let admin = seed(&f.storage, "root@x.com", Role::Admin).await;

    let err = f
        .accounts
        .soft_delete_user(&identity(&admin), admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkhubError::Validation(_)));
}
