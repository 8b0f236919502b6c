mod common;

use artshare::ArtshareError;
use artshare::db::models::{ArtworkType, DbAuthenticator, LicenseType, NewArtwork};
use artshare::github_oauth::{AccountTokens, GithubProfile, SignInService};
use chrono::{Duration, Utc};
use common::{TestDb, github_account, register};
use tokio::task::JoinSet;

fn artwork(title: &str, profile_id: &str) -> NewArtwork {
    NewArtwork {
        title: title.to_string(),
        description: None,
        main_image: format!("https://cdn.example.com/{title}.png"),
        extra_images: vec![],
        kind: ArtworkType::DigitalArt,
        license_type: LicenseType::CreativeCommons,
        is_publish: true,
        profile_id: Some(profile_id.to_string()),
        category_id: None,
    }
}

#[tokio::test]
async fn duplicate_provider_account_is_a_unique_violation() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (user, _) = register(&t.db, "ann", "1001").await;

    let mut dup = github_account("1001");
    dup.user_id = user.id.clone();
    let err = t.db.link_account(dup).await.unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");

    let mut other = github_account("1002");
    other.user_id = user.id.clone();
    t.db.link_account(other).await.unwrap();
    assert_eq!(t.db.list_accounts_by_user(&user.id).await.unwrap().len(), 2);

    t.cleanup().await;
}

#[tokio::test]
async fn deleting_a_user_cascades_to_auth_rows() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (user, profile) = register(&t.db, "bob", "2001").await;
    let session = t
        .db
        .create_session(&user.id, Utc::now() + Duration::days(30))
        .await
        .unwrap();
    t.db.create_authenticator(DbAuthenticator {
        credential_id: "cred-1".to_string(),
        user_id: user.id.clone(),
        provider_account_id: "2001".to_string(),
        credential_public_key: "pk".to_string(),
        counter: 0,
        credential_device_type: "singleDevice".to_string(),
        credential_backed_up: false,
        transports: None,
    })
    .await
    .unwrap();

    assert!(t.db.delete_user(&user.id).await.unwrap());

    assert!(t.db.get_user(&user.id).await.unwrap().is_none());
    assert!(t.db.list_accounts_by_user(&user.id).await.unwrap().is_empty());
    assert!(
        t.db.get_session_and_user(&session.session_token)
            .await
            .unwrap()
            .is_none()
    );
    assert!(t.db.get_authenticator("cred-1").await.unwrap().is_none());
    // Profiles are not tied to the user by a cascading key.
    assert!(t.db.get_profile(&profile.id).await.unwrap().is_some());

    t.cleanup().await;
}

#[tokio::test]
async fn comment_parent_must_exist_and_share_the_artwork() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (_, owner) = register(&t.db, "cara", "3001").await;
    let (_, reader) = register(&t.db, "dan", "3002").await;
    let first = t.db.create_artwork(artwork("dawn", &owner.id), &[]).await.unwrap();
    let second = t.db.create_artwork(artwork("dusk", &owner.id), &[]).await.unwrap();

    let err = t
        .db
        .add_comment(&first.id, &reader.id, "nice", Some("no-such-comment"))
        .await
        .unwrap_err();
    assert!(err.is_foreign_key_violation(), "unexpected error: {err}");

    let root = t
        .db
        .add_comment(&first.id, &reader.id, "nice", None)
        .await
        .unwrap();
    let reply = t
        .db
        .add_comment(&first.id, &owner.id, "thanks", Some(&root.id))
        .await
        .unwrap();
    assert_eq!(reply.parent_comment_id.as_deref(), Some(root.id.as_str()));

    let err = t
        .db
        .add_comment(&second.id, &reader.id, "wrong thread", Some(&root.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ArtshareError::InvalidParentComment));

    assert_eq!(t.db.list_comments(&first.id).await.unwrap().len(), 2);
    // Only the reader's comment notifies the owner.
    assert_eq!(
        t.db.list_notifications(&owner.id, false).await.unwrap().len(),
        1
    );

    t.cleanup().await;
}

#[tokio::test]
async fn likes_are_counted_once_per_profile() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (_, owner) = register(&t.db, "eve", "4001").await;
    let (_, fan) = register(&t.db, "fay", "4002").await;
    let art = t
        .db
        .create_artwork(artwork("sea", &owner.id), &["ocean", "blue"])
        .await
        .unwrap();

    assert!(t.db.like_artwork(&art.id, &fan.id).await.unwrap());
    assert!(!t.db.like_artwork(&art.id, &fan.id).await.unwrap());
    assert!(t.db.like_artwork(&art.id, &owner.id).await.unwrap());

    let stored = t.db.get_artwork(&art.id).await.unwrap().unwrap();
    assert_eq!(stored.likes_count, Some(2));
    assert_eq!(t.db.list_likes(&art.id).await.unwrap().len(), 2);

    assert!(t.db.unlike_artwork(&art.id, &fan.id).await.unwrap());
    assert!(!t.db.unlike_artwork(&art.id, &fan.id).await.unwrap());
    let stored = t.db.get_artwork(&art.id).await.unwrap().unwrap();
    assert_eq!(stored.likes_count, Some(1));

    // Self-likes do not notify.
    let notes = t.db.list_notifications(&owner.id, true).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].content.contains("sea"));

    let tags: Vec<String> = t
        .db
        .list_artwork_tags(&art.id)
        .await
        .unwrap()
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    assert_eq!(tags, vec!["blue".to_string(), "ocean".to_string()]);

    let err = t.db.like_artwork("missing", &fan.id).await.unwrap_err();
    assert!(matches!(err, ArtshareError::NotFound("artwork")));

    t.cleanup().await;
}

#[tokio::test]
async fn favorites_and_views() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (_, owner) = register(&t.db, "gus", "5001").await;
    let art = t.db.create_artwork(artwork("hill", &owner.id), &[]).await.unwrap();

    assert!(t.db.favorite_artwork(&art.id, &owner.id).await.unwrap());
    assert!(!t.db.favorite_artwork(&art.id, &owner.id).await.unwrap());
    assert_eq!(t.db.list_favorites(&owner.id).await.unwrap().len(), 1);
    assert!(t.db.unfavorite_artwork(&art.id, &owner.id).await.unwrap());

    assert_eq!(t.db.record_view(&art.id).await.unwrap(), 1);
    assert_eq!(t.db.record_view(&art.id).await.unwrap(), 2);

    assert!(t.db.soft_delete_artwork(&art.id).await.unwrap());
    assert!(t.db.list_artworks_by_profile(&owner.id).await.unwrap().is_empty());
    assert!(matches!(
        t.db.record_view(&art.id).await.unwrap_err(),
        ArtshareError::NotFound(_)
    ));

    t.cleanup().await;
}

#[tokio::test]
async fn follows_reject_self_and_duplicates() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (_, a) = register(&t.db, "hal", "6001").await;
    let (_, b) = register(&t.db, "ida", "6002").await;

    assert!(matches!(
        t.db.follow_profile(&a.id, &a.id).await.unwrap_err(),
        ArtshareError::SelfFollow
    ));
    assert!(t.db.follow_profile(&a.id, &b.id).await.unwrap());
    assert!(!t.db.follow_profile(&a.id, &b.id).await.unwrap());
    assert_eq!(t.db.count_followers(&b.id).await.unwrap(), 1);
    assert_eq!(t.db.list_following(&a.id).await.unwrap().len(), 1);

    assert_eq!(t.db.mark_all_read(&b.id).await.unwrap(), 1);
    assert!(t.db.list_notifications(&b.id, true).await.unwrap().is_empty());

    assert!(t.db.unfollow_profile(&a.id, &b.id).await.unwrap());
    assert_eq!(t.db.count_followers(&b.id).await.unwrap(), 0);

    t.cleanup().await;
}

#[tokio::test]
async fn verification_tokens_are_single_use() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let expires = Utc::now() + Duration::hours(1);
    t.db.create_verification_token("jo@example.com", "tok", expires)
        .await
        .unwrap();
    let err = t
        .db
        .create_verification_token("jo@example.com", "tok", expires)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    assert!(
        t.db.use_verification_token("jo@example.com", "tok")
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        t.db.use_verification_token("jo@example.com", "tok")
            .await
            .unwrap()
            .is_none()
    );

    t.cleanup().await;
}

#[tokio::test]
async fn sessions_extend_and_expire() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (user, _) = register(&t.db, "kim", "7001").await;
    let stale = t
        .db
        .create_session(&user.id, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    let live = t
        .db
        .create_session(&user.id, Utc::now() + Duration::days(1))
        .await
        .unwrap();
    assert_ne!(stale.session_token, live.session_token);

    let later = Utc::now() + Duration::days(30);
    let updated = t
        .db
        .update_session_expiry(&live.session_token, later)
        .await
        .unwrap()
        .unwrap();
    assert!(updated.expires > live.expires);

    assert_eq!(t.db.delete_expired_sessions().await.unwrap(), 1);
    let found = t
        .db
        .get_session_and_user(&live.session_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.user.id, user.id);

    t.cleanup().await;
}

#[tokio::test]
async fn repeated_tag_names_link_once() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (_, owner) = register(&t.db, "noa", "9001").await;
    let art = t
        .db
        .create_artwork(artwork("rain", &owner.id), &["wet", "grey", "wet"])
        .await
        .unwrap();
    assert_eq!(t.db.list_artwork_tag_links(&art.id).await.unwrap().len(), 2);

    let mut four = artwork("quad", &owner.id);
    four.extra_images = (1..=4).map(|i| format!("{i}.png")).collect();
    assert!(matches!(
        t.db.create_artwork(four, &[]).await.unwrap_err(),
        ArtshareError::TooManyImages(4)
    ));

    t.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_likes_keep_the_counter_in_step() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (_, owner) = register(&t.db, "olga", "9101").await;
    let art = t.db.create_artwork(artwork("pier", &owner.id), &[]).await.unwrap();
    let mut fans = Vec::new();
    for i in 0..8 {
        let (_, fan) = register(&t.db, &format!("fan{i}"), &format!("91{i:02}x")).await;
        fans.push(fan.id);
    }

    let mut tasks = JoinSet::new();
    for round in 0..2 {
        for fan in &fans {
            let (db, art_id, fan) = (t.db.clone(), art.id.clone(), fan.clone());
            tasks.spawn(async move {
                if round == 1 {
                    db.unlike_artwork(&art_id, &fan).await.map(|_| ())?;
                }
                db.like_artwork(&art_id, &fan).await.map(|_| ())
            });
        }
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap().unwrap();
    }

    let likes = t.db.list_likes(&art.id).await.unwrap();
    let stored = t.db.get_artwork(&art.id).await.unwrap().unwrap();
    assert_eq!(stored.likes_count, Some(likes.len() as i32));
    assert!(likes.len() <= fans.len());

    t.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_comments_on_one_artwork_all_land() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let (_, owner) = register(&t.db, "pia", "9201").await;
    let (_, reader) = register(&t.db, "quin", "9202").await;
    let art = t.db.create_artwork(artwork("fog", &owner.id), &[]).await.unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..16 {
        let (db, art_id, reader) = (t.db.clone(), art.id.clone(), reader.id.clone());
        tasks.spawn(async move {
            db.add_comment(&art_id, &reader, &format!("hi {i}"), None)
                .await
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap().unwrap();
    }

    assert_eq!(t.db.list_comments(&art.id).await.unwrap().len(), 16);
    assert_eq!(
        t.db.list_notifications(&owner.id, true).await.unwrap().len(),
        16
    );

    t.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mutual_follows_issued_together_both_succeed() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let mut pairs = Vec::new();
    for i in 0..10 {
        let (_, a) = register(&t.db, &format!("left{i}"), &format!("93{i:02}a")).await;
        let (_, b) = register(&t.db, &format!("right{i}"), &format!("93{i:02}b")).await;
        pairs.push((a.id, b.id));
    }

    let mut tasks = JoinSet::new();
    for (a, b) in &pairs {
        for (from, to) in [(a.clone(), b.clone()), (b.clone(), a.clone())] {
            let db = t.db.clone();
            tasks.spawn(async move { db.follow_profile(&from, &to).await });
        }
    }
    while let Some(res) = tasks.join_next().await {
        assert!(res.unwrap().unwrap());
    }

    for (a, b) in &pairs {
        assert_eq!(t.db.count_followers(a).await.unwrap(), 1);
        assert_eq!(t.db.count_followers(b).await.unwrap(), 1);
    }

    t.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_first_sign_ins_share_one_user() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    let profile = GithubProfile {
        provider_account_id: "9401".to_string(),
        name: "rhea".to_string(),
        email: Some("rhea@example.com".to_string()),
        image: None,
    };
    let service = SignInService::new(t.db.clone(), 3600);

    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        let (service, profile) = (service.clone(), profile.clone());
        tasks.spawn(async move { service.complete(&profile, AccountTokens::default()).await });
    }
    let mut user_ids = Vec::new();
    while let Some(res) = tasks.join_next().await {
        user_ids.push(res.unwrap().unwrap().user_id);
    }
    user_ids.sort();
    user_ids.dedup();
    assert_eq!(user_ids.len(), 1);

    let user = t
        .db
        .get_user_by_account("github", "9401")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.id, user_ids[0]);
    assert!(t.db.get_profile_by_user(&user.id).await.unwrap().is_some());

    t.cleanup().await;
}

#[tokio::test]
async fn new_github_account_with_a_taken_email_is_not_linked() {
    let Some(t) = TestDb::create().await else {
        return;
    };

    register(&t.db, "sol", "9501").await;
    let profile = GithubProfile {
        provider_account_id: "9502".to_string(),
        name: "sol again".to_string(),
        email: Some("sol@example.com".to_string()),
        image: None,
    };
    let err = SignInService::new(t.db.clone(), 3600)
        .complete(&profile, AccountTokens::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ArtshareError::AccountNotLinked));
    assert!(
        t.db.get_user_by_account("github", "9502")
            .await
            .unwrap()
            .is_none()
    );

    t.cleanup().await;
}
