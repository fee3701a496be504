//! Tests for the auth module
//!
//! Flow tests run the account resolver against an in-memory SQLite pool so
//! the matching/conflict/creation rules and the session lifecycle are
//! exercised end to end without HTTP.

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    use crate::auth::google::{profile_from_claims, VerifiedProfile};
    use crate::auth::models::{RegisterRequest, User};
    use crate::auth::password::{hash_password, verify_password};
    use crate::auth::resolver::{self, AuthFlowError, SessionIdentity};
    use crate::auth::session::{mint_session, validate_session, TOKEN_LEN};
    use crate::auth::store;
    use crate::common::migrations::run_migrations;

    async fn test_pool() -> SqlitePool {
        // Single connection so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            email: email.to_string(),
            password: "longenough".to_string(),
        }
    }

    fn local_user(user_id: &str, email: &str) -> User {
        User {
            user_id: user_id.to_string(),
            email: email.to_string(),
            password_hash: Some("$2b$10$7EqJtq98hPqEX7fNZaFWoOhi5B1bsXpRcnmkq3u1D7pZIsS2Mku5e".to_string()),
            google_user_id: None,
            email_verified: false,
            first_name: "A".to_string(),
            last_name: "B".to_string(),
        }
    }

    fn google_profile(subject: &str, email: &str) -> VerifiedProfile {
        VerifiedProfile {
            subject: subject.to_string(),
            email: email.to_string(),
            email_verified: true,
            given_name: "Greta".to_string(),
            family_name: "Vance".to_string(),
        }
    }

    async fn user_count(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    // ========================================================================
    // Password hashing
    // ========================================================================

    #[test]
    fn test_hash_embeds_cost_and_round_trips() {
        let hash = hash_password("longenough").unwrap();
        // Self-describing modular crypt format with the fixed work factor
        assert!(hash.starts_with("$2"), "unexpected hash format: {}", hash);
        assert!(hash.contains("$10$"), "cost 10 not embedded: {}", hash);
        assert!(verify_password("longenough", &hash));
        assert!(!verify_password("wrongpassword", &hash));
    }

    #[test]
    fn test_verify_malformed_hash_is_false_not_error() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "$2b$10$truncated"));
    }

    // ========================================================================
    // Session manager
    // ========================================================================

    #[tokio::test]
    async fn test_mint_then_validate_round_trip() {
        let pool = test_pool().await;
        let session = resolver::register_with_password(&pool, &register_request("rt@example.com"))
            .await
            .unwrap();

        let credential = mint_session(&pool, &session.user.user_id).await.unwrap();
        let resolved = validate_session(&pool, &credential).await.unwrap();
        assert_eq!(resolved, Some(session.user.user_id.clone()));

        let (prefix, token) = credential.split_once(':').unwrap();
        assert_eq!(prefix, session.user.user_id);
        assert_eq!(token.len(), TOKEN_LEN);
    }

    #[tokio::test]
    async fn test_validate_rejects_wrong_shape() {
        let pool = test_pool().await;

        assert_eq!(validate_session(&pool, "").await.unwrap(), None);
        assert_eq!(validate_session(&pool, "nocolon").await.unwrap(), None);
        assert_eq!(
            validate_session(&pool, "one:two:three").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_validate_rejects_unknown_pair() {
        let pool = test_pool().await;
        let session = resolver::register_with_password(&pool, &register_request("sv@example.com"))
            .await
            .unwrap();

        // Well-formed but not a stored record
        let forged = format!("{}:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", session.user.user_id);
        assert_eq!(validate_session(&pool, &forged).await.unwrap(), None);

        // Stored token presented under a different user id
        let (_, token) = session.credential.split_once(':').unwrap();
        let crossed = format!("U_ZZZZZZ:{}", token);
        assert_eq!(validate_session(&pool, &crossed).await.unwrap(), None);
    }

    // ========================================================================
    // Register-by-password
    // ========================================================================

    #[tokio::test]
    async fn test_register_fresh_email_creates_local_account() {
        let pool = test_pool().await;
        let session = resolver::register_with_password(&pool, &register_request("a@b.com"))
            .await
            .unwrap();

        assert!(session.user.password_hash.is_some());
        assert!(session.user.google_user_id.is_none());
        assert!(!session.user.email_verified);

        // Credential returned by registration is immediately valid
        let resolved = validate_session(&pool, &session.credential).await.unwrap();
        assert_eq!(resolved, Some(session.user.user_id.clone()));

        // The row actually landed with the same shape
        let stored = store::find_user_by_email(&pool, "a@b.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.user_id, session.user.user_id);
        assert!(stored.password_hash.is_some());
        assert!(stored.google_user_id.is_none());
    }

    #[tokio::test]
    async fn test_register_field_validation() {
        let pool = test_pool().await;

        let mut req = register_request("v@example.com");
        req.first_name = String::new();
        assert!(matches!(
            resolver::register_with_password(&pool, &req).await,
            Err(AuthFlowError::MissingName)
        ));

        let mut req = register_request("v@example.com");
        req.email = String::new();
        assert!(matches!(
            resolver::register_with_password(&pool, &req).await,
            Err(AuthFlowError::MissingEmailField)
        ));

        let mut req = register_request("v@example.com");
        req.password = String::new();
        assert!(matches!(
            resolver::register_with_password(&pool, &req).await,
            Err(AuthFlowError::MissingPasswordField)
        ));

        let req = register_request("not-an-email");
        assert!(matches!(
            resolver::register_with_password(&pool, &req).await,
            Err(AuthFlowError::InvalidEmail)
        ));

        let mut req = register_request("v@example.com");
        req.password = "short".to_string();
        assert!(matches!(
            resolver::register_with_password(&pool, &req).await,
            Err(AuthFlowError::PasswordTooShort)
        ));

        assert_eq!(user_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_register_twice_never_duplicates() {
        let pool = test_pool().await;
        resolver::register_with_password(&pool, &register_request("dup@example.com"))
            .await
            .unwrap();

        let second = resolver::register_with_password(&pool, &register_request("dup@example.com"))
            .await;
        assert!(matches!(second, Err(AuthFlowError::EmailAlreadyRegistered)));
        assert_eq!(user_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_register_race_is_caught_by_email_constraint() {
        // Two concurrent registrations can both pass the advisory pre-check;
        // the loser's insert must hit UNIQUE(users.email) and be reported as
        // the same conflict the pre-check would have given
        let pool = test_pool().await;
        store::insert_local_user(&pool, &local_user("U_RACE01", "race@example.com"))
            .await
            .unwrap();

        let err = store::insert_local_user(&pool, &local_user("U_RACE02", "race@example.com"))
            .await
            .unwrap_err();
        assert!(store::is_unique_violation(&err, "users.email"));
        assert!(!store::is_unique_violation(&err, "users.userId"));
        assert!(matches!(
            resolver::register_insert_error(err),
            AuthFlowError::EmailAlreadyRegistered
        ));
        assert_eq!(user_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_user_id_collision_is_not_a_registration_conflict() {
        // A generated-ID collision violates the primary key, not the email
        // constraint - it must surface as a generic store failure
        let pool = test_pool().await;
        store::insert_local_user(&pool, &local_user("U_SAME01", "one@example.com"))
            .await
            .unwrap();

        let err = store::insert_local_user(&pool, &local_user("U_SAME01", "two@example.com"))
            .await
            .unwrap_err();
        assert!(store::is_unique_violation(&err, "users.userId"));
        assert!(!store::is_unique_violation(&err, "users.email"));
        assert!(matches!(
            resolver::register_insert_error(err),
            AuthFlowError::Store(_)
        ));
    }

    #[tokio::test]
    async fn test_register_same_email_different_case_conflicts() {
        // NOCASE collation: A@b.com and a@b.com are one identity, both at
        // the pre-check and at the constraint
        let pool = test_pool().await;
        resolver::register_with_password(&pool, &register_request("case@example.com"))
            .await
            .unwrap();

        let second =
            resolver::register_with_password(&pool, &register_request("CASE@Example.COM")).await;
        assert!(matches!(second, Err(AuthFlowError::EmailAlreadyRegistered)));

        let err = store::insert_local_user(&pool, &local_user("U_CASE02", "Case@example.com"))
            .await
            .unwrap_err();
        assert!(store::is_unique_violation(&err, "users.email"));
        assert_eq!(user_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_register_accepts_multibyte_email() {
        // The full flow, masked logging included, must handle a local part
        // that starts with a multibyte character
        let pool = test_pool().await;
        let session = resolver::register_with_password(&pool, &register_request("émail@example.com"))
            .await
            .unwrap();
        assert_eq!(session.user.email, "émail@example.com");

        let logged_in = resolver::login_with_password(&pool, "émail@example.com", "longenough")
            .await
            .unwrap();
        assert_eq!(logged_in.user.user_id, session.user.user_id);
    }

    #[tokio::test]
    async fn test_register_with_federated_email_directs_to_google() {
        let pool = test_pool().await;
        store::insert_federated_user(&pool, "U_FED001", &google_profile("sub-1", "fed@example.com"))
            .await
            .unwrap();

        let result =
            resolver::register_with_password(&pool, &register_request("fed@example.com")).await;
        assert!(matches!(result, Err(AuthFlowError::UseFederatedLogin)));
        assert_eq!(user_count(&pool).await, 1);
    }

    // ========================================================================
    // Login-by-password
    // ========================================================================

    #[tokio::test]
    async fn test_login_after_register_resolves_same_account() {
        let pool = test_pool().await;
        let registered =
            resolver::register_with_password(&pool, &register_request("same@example.com"))
                .await
                .unwrap();

        let logged_in = resolver::login_with_password(&pool, "same@example.com", "longenough")
            .await
            .unwrap();
        assert_eq!(logged_in.user.user_id, registered.user.user_id);

        // A fresh session, not a replay of the registration credential
        assert_ne!(logged_in.credential, registered.credential);
        let resolved = validate_session(&pool, &logged_in.credential).await.unwrap();
        assert_eq!(resolved, Some(registered.user.user_id));
    }

    #[tokio::test]
    async fn test_login_field_validation() {
        let pool = test_pool().await;

        assert!(matches!(
            resolver::login_with_password(&pool, "", "pw").await,
            Err(AuthFlowError::MissingEmail)
        ));
        assert!(matches!(
            resolver::login_with_password(&pool, "a@b.com", "").await,
            Err(AuthFlowError::MissingPassword)
        ));
    }

    #[tokio::test]
    async fn test_login_unknown_email_fails() {
        let pool = test_pool().await;
        assert!(matches!(
            resolver::login_with_password(&pool, "nobody@example.com", "whatever").await,
            Err(AuthFlowError::NoAccountForEmail)
        ));
    }

    #[tokio::test]
    async fn test_login_wrong_password_fails() {
        let pool = test_pool().await;
        resolver::register_with_password(&pool, &register_request("wp@example.com"))
            .await
            .unwrap();

        assert!(matches!(
            resolver::login_with_password(&pool, "wp@example.com", "wrongpassword").await,
            Err(AuthFlowError::InvalidPassword)
        ));
    }

    #[tokio::test]
    async fn test_password_login_against_federated_account_fails() {
        let pool = test_pool().await;
        store::insert_federated_user(&pool, "U_FED002", &google_profile("sub-2", "g@example.com"))
            .await
            .unwrap();

        // Regardless of password value - there is no hash to compare against
        for password in ["longenough", "", "anything-else"] {
            let result = resolver::login_with_password(&pool, "g@example.com", password).await;
            if password.is_empty() {
                assert!(matches!(result, Err(AuthFlowError::MissingPassword)));
            } else {
                assert!(matches!(result, Err(AuthFlowError::UseFederatedLogin)));
            }
        }
    }

    // ========================================================================
    // Federated login
    // ========================================================================

    #[tokio::test]
    async fn test_federated_login_creates_account_on_first_login() {
        let pool = test_pool().await;
        let session = resolver::login_with_google(&pool, google_profile("sub-3", "new@example.com"))
            .await
            .unwrap();

        assert_eq!(session.user.google_user_id.as_deref(), Some("sub-3"));
        assert!(session.user.password_hash.is_none());
        assert!(session.user.email_verified);
        assert_eq!(session.user.first_name, "Greta");
        assert_eq!(session.user.last_name, "Vance");

        let resolved = validate_session(&pool, &session.credential).await.unwrap();
        assert_eq!(resolved, Some(session.user.user_id));
    }

    #[tokio::test]
    async fn test_federated_login_matching_local_email_conflicts() {
        let pool = test_pool().await;
        resolver::register_with_password(&pool, &register_request("local@example.com"))
            .await
            .unwrap();

        // Same email, never linked to Google: refuse rather than auto-link
        let result =
            resolver::login_with_google(&pool, google_profile("sub-4", "local@example.com")).await;
        assert!(matches!(result, Err(AuthFlowError::UsePasswordLogin)));
        assert_eq!(user_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_federated_login_different_subject_same_email_conflicts() {
        let pool = test_pool().await;
        resolver::login_with_google(&pool, google_profile("sub-5", "shared@example.com"))
            .await
            .unwrap();

        let result =
            resolver::login_with_google(&pool, google_profile("sub-other", "shared@example.com"))
                .await;
        assert!(matches!(result, Err(AuthFlowError::UsePasswordLogin)));
        assert_eq!(user_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_federated_login_returning_user_mints_fresh_session() {
        let pool = test_pool().await;
        let first = resolver::login_with_google(&pool, google_profile("sub-6", "ret@example.com"))
            .await
            .unwrap();
        let second = resolver::login_with_google(&pool, google_profile("sub-6", "ret@example.com"))
            .await
            .unwrap();

        assert_eq!(first.user.user_id, second.user.user_id);
        assert_ne!(first.credential, second.credential);

        // Both sessions stay valid - single-token-per-login, no revocation
        assert!(validate_session(&pool, &first.credential).await.unwrap().is_some());
        assert!(validate_session(&pool, &second.credential).await.unwrap().is_some());
        assert_eq!(user_count(&pool).await, 1);
    }

    // ========================================================================
    // Session-backed identity fetch
    // ========================================================================

    #[tokio::test]
    async fn test_fetch_identity_states() {
        let pool = test_pool().await;
        let session = resolver::register_with_password(&pool, &register_request("id@example.com"))
            .await
            .unwrap();

        assert!(matches!(
            resolver::fetch_identity(&pool, None).await.unwrap(),
            SessionIdentity::Missing
        ));
        assert!(matches!(
            resolver::fetch_identity(&pool, Some("garbage")).await.unwrap(),
            SessionIdentity::Invalid
        ));
        assert!(matches!(
            resolver::fetch_identity(&pool, Some("U_NOBODY:notatoken")).await.unwrap(),
            SessionIdentity::Invalid
        ));

        match resolver::fetch_identity(&pool, Some(&session.credential)).await.unwrap() {
            SessionIdentity::Active(user) => assert_eq!(user.user_id, session.user.user_id),
            other => panic!("expected active identity, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_identity_orphaned_session_is_an_error() {
        let pool = test_pool().await;
        let session = resolver::register_with_password(&pool, &register_request("rm@example.com"))
            .await
            .unwrap();

        // Disable FK enforcement so the delete can orphan the login row,
        // simulating an account removed out-of-band while a session survives.
        sqlx::query("PRAGMA foreign_keys = OFF").execute(&pool).await.unwrap();
        sqlx::query("DELETE FROM users WHERE userId = ?")
            .bind(&session.user.user_id)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await.unwrap();

        let result = resolver::fetch_identity(&pool, Some(&session.credential)).await;
        assert!(matches!(result, Err(AuthFlowError::InvalidUser)));
    }

    // ========================================================================
    // Google claim interpretation
    // ========================================================================

    const NOW: i64 = 1_700_000_000;

    fn valid_claims() -> serde_json::Value {
        serde_json::json!({
            "sub": "110169484474386276334",
            "email": "greta@example.com",
            "email_verified": "true",
            "given_name": "Greta",
            "family_name": "Vance",
            "aud": "client-id-123",
            "exp": NOW + 3600,
        })
    }

    #[test]
    fn test_claims_well_formed_token_yields_profile() {
        let profile = profile_from_claims(&valid_claims(), Some("client-id-123"), NOW).unwrap();
        assert_eq!(profile.subject, "110169484474386276334");
        assert_eq!(profile.email, "greta@example.com");
        assert!(profile.email_verified);
        assert_eq!(profile.given_name, "Greta");
        assert_eq!(profile.family_name, "Vance");
    }

    #[test]
    fn test_claims_string_typed_values_are_accepted() {
        // tokeninfo serializes numbers and booleans as strings
        let mut claims = valid_claims();
        claims["exp"] = serde_json::json!((NOW + 3600).to_string());
        claims["email_verified"] = serde_json::json!("true");

        let profile = profile_from_claims(&claims, Some("client-id-123"), NOW).unwrap();
        assert!(profile.email_verified);
    }

    #[test]
    fn test_claims_missing_required_fields_fail() {
        let mut claims = valid_claims();
        claims.as_object_mut().unwrap().remove("sub");
        assert!(profile_from_claims(&claims, None, NOW).is_err());

        let mut claims = valid_claims();
        claims.as_object_mut().unwrap().remove("email");
        assert!(profile_from_claims(&claims, None, NOW).is_err());
    }

    #[test]
    fn test_claims_expired_token_fails() {
        let mut claims = valid_claims();
        claims["exp"] = serde_json::json!(NOW - 1);
        assert!(profile_from_claims(&claims, None, NOW).is_err());
    }

    #[test]
    fn test_claims_audience_mismatch_fails() {
        assert!(profile_from_claims(&valid_claims(), Some("some-other-client"), NOW).is_err());

        let mut claims = valid_claims();
        claims.as_object_mut().unwrap().remove("aud");
        assert!(profile_from_claims(&claims, Some("client-id-123"), NOW).is_err());

        // Without a configured audience the aud claim is not checked
        assert!(profile_from_claims(&valid_claims(), None, NOW).is_ok());
    }

    #[test]
    fn test_claims_missing_names_default_to_empty() {
        let mut claims = valid_claims();
        claims.as_object_mut().unwrap().remove("given_name");
        claims.as_object_mut().unwrap().remove("family_name");

        let profile = profile_from_claims(&claims, None, NOW).unwrap();
        assert_eq!(profile.given_name, "");
        assert_eq!(profile.family_name, "");
    }

    // ========================================================================
    // End-to-end scenario
    // ========================================================================

    #[tokio::test]
    async fn test_register_login_conflict_scenario() {
        let pool = test_pool().await;

        // Register succeeds, email unverified
        let registered = resolver::register_with_password(&pool, &register_request("a@b.com"))
            .await
            .unwrap();
        assert!(!registered.user.email_verified);

        // Immediate login with the same credentials resolves the same account
        let logged_in = resolver::login_with_password(&pool, "a@b.com", "longenough")
            .await
            .unwrap();
        assert_eq!(logged_in.user.user_id, registered.user.user_id);

        // Wrong password
        let wrong = resolver::login_with_password(&pool, "a@b.com", "wrong-password")
            .await
            .unwrap_err();
        assert_eq!(wrong.to_string(), "Invalid password");

        // Duplicate registration
        let dup = resolver::register_with_password(&pool, &register_request("a@b.com"))
            .await
            .unwrap_err();
        assert_eq!(
            dup.to_string(),
            "You've already registered an account with that email"
        );
    }
}
