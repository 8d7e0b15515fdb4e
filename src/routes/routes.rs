//! Defines routes for listings, profiles and image assets.
//!
//! ## Structure
//! - **Listings**
//!   - `GET    /listings` - browse (`type`, `offer`, `user_id`, price range, rooms, `sort`)
//!   - `POST   /listings` - create (multipart)
//!   - `GET    /listings/{id}` - listing with preview URLs
//!   - `PUT    /listings/{id}` - edit (multipart)
//!   - `DELETE /listings/{id}` - delete listing and its images
//!   - `DELETE /listings/{id}/images/{index}` - remove one attached image
//!   - `POST   /listings/{id}/contact` - mailto link for the owner
//!
//! - **Profiles**
//!   - `POST /profiles`, `GET|PUT|DELETE /profiles/{user_id}`
//!   - `GET  /profiles/{user_id}/listings`
//!
//! - **Assets**
//!   - `GET /assets/{id}` and `GET /assets/{id}/preview`

use crate::{
    handlers::{
        asset_handlers::{get_asset, get_asset_preview},
        health_handlers::{healthz, readyz},
        listing_handlers::{
            contact_owner, create_listing, delete_listing, get_listing, list_listings,
            remove_listing_image, update_listing,
        },
        profile_handlers::{
            create_profile, delete_profile, get_profile, list_profile_listings, update_profile,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build the router for every HTTP route. Handlers share `AppState`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Listings
        .route("/listings", get(list_listings).post(create_listing))
        .route(
            "/listings/{id}",
            get(get_listing).put(update_listing).delete(delete_listing),
        )
        .route(
            "/listings/{id}/images/{index}",
            delete(remove_listing_image),
        )
        .route("/listings/{id}/contact", post(contact_owner))
        // Profiles
        .route("/profiles", post(create_profile))
        .route(
            "/profiles/{user_id}",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/profiles/{user_id}/listings", get(list_profile_listings))
        // Assets
        .route("/assets/{id}", get(get_asset))
        .route("/assets/{id}/preview", get(get_asset_preview))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        models::listing::Geolocation,
        services::{object_store::DiskObjectStore, testing::StaticLookup},
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "listing-test-boundary";
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n fake image";

    async fn app() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(db::memory_pool().await.unwrap());
        let objects = DiskObjectStore::new(db.clone(), dir.path(), "http://listings.test");
        let lookup = Arc::new(StaticLookup::found(vec![Geolocation::new(40.71, -74.0)]));
        let state = AppState::new(db, objects, lookup);
        (dir, routes().with_state(state))
    }

    fn multipart_body(listing: &Value, images: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"listing\"\r\n\
                 Content-Type: application/json\r\n\r\n{listing}\r\n"
            )
            .as_bytes(),
        );
        for (filename, bytes) in images {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; \
                     filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn create_request(user: &str, body: Vec<u8>) -> Request<Body> {
        multipart_request("POST", "/listings", user, body)
    }

    fn multipart_request(method: &str, uri: &str, user: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", user)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn sunny_loft() -> Value {
        json!({
            "type": "rent",
            "name": "Sunny Loft Apt",
            "bedrooms": 2,
            "bathrooms": 1,
            "regularPrice": 1200,
            "offer": false,
            "address": "123 Main St",
            "description": "Bright top floor flat"
        })
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let (_dir, app) = app().await;
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readyz_checks_database_and_storage() {
        let (_dir, app) = app().await;
        let response = app
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
        assert_eq!(body["checks"]["storage"]["ok"], true);
    }

    #[tokio::test]
    async fn empty_browse_returns_empty_list() {
        let (_dir, app) = app().await;
        let response = app
            .oneshot(Request::get("/listings?type=rent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn create_requires_actor() {
        let (_dir, app) = app().await;
        let response = app
            .oneshot(
                Request::post("/listings")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body(&sunny_loft(), &[])))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_listing_is_404() {
        let (_dir, app) = app().await;
        let response = app
            .oneshot(
                Request::get(format!("/listings/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_then_fetch_listing_and_image() {
        let (_dir, app) = app().await;
        let images: [(&str, &[u8]); 3] = [("a.png", PNG), ("b.png", PNG), ("c.png", PNG)];

        let response = app
            .clone()
            .oneshot(create_request("owner-1", multipart_body(&sunny_loft(), &images)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["nextView"], "profile");

        let listing = &created["listing"];
        assert_eq!(listing["type"], "rent");
        assert_eq!(listing["userId"], "owner-1");
        assert_eq!(listing["geolocation"], json!([40.71, -74.0]));
        assert!(listing.get("discountedPrice").is_none_or(Value::is_null));
        let image_ids = listing["images"].as_array().unwrap();
        assert_eq!(image_ids.len(), 3);

        let id = listing["id"].as_str().unwrap();
        let gallery = app
            .clone()
            .oneshot(Request::get(format!("/listings/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(gallery.status(), StatusCode::OK);
        let gallery = json_body(gallery).await;
        let cover = image_ids[0].as_str().unwrap();
        assert!(
            gallery["imageUrls"][0]
                .as_str()
                .unwrap()
                .starts_with(&format!("http://listings.test/assets/{cover}/preview?"))
        );

        let asset = app
            .oneshot(Request::get(format!("/assets/{cover}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(asset.status(), StatusCode::OK);
        assert_eq!(asset.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = asset.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], PNG);
    }

    #[tokio::test]
    async fn edit_appends_images_and_keeps_cover() {
        let (_dir, app) = app().await;
        let response = app
            .clone()
            .oneshot(create_request(
                "owner-1",
                multipart_body(&sunny_loft(), &[("a.png", PNG)]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        let id = created["listing"]["id"].as_str().unwrap().to_string();
        let cover = created["listing"]["images"][0].clone();

        let images: [(&str, &[u8]); 2] = [("b.png", PNG), ("c.png", PNG)];
        let edit = multipart_body(&json!({ "name": "Sunny Loft Deluxe" }), &images);
        let response = app
            .clone()
            .oneshot(multipart_request("PUT", &format!("/listings/{id}"), "owner-1", edit))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let edited = json_body(response).await;
        let listing = &edited["listing"];
        assert_eq!(listing["id"], id.as_str());
        assert_eq!(listing["name"], "Sunny Loft Deluxe");
        assert_eq!(listing["address"], "123 Main St");
        assert_eq!(listing["images"].as_array().unwrap().len(), 3);
        assert_eq!(listing["images"][0], cover);

        let gallery = app
            .oneshot(Request::get(format!("/listings/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(gallery.status(), StatusCode::OK);
        let gallery = json_body(gallery).await;
        assert_eq!(gallery["coverImage"], cover);
        assert_eq!(gallery["imageUrls"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn offer_price_ordering_is_rejected() {
        let (_dir, app) = app().await;
        let mut listing = sunny_loft();
        listing["offer"] = json!(true);
        listing["regularPrice"] = json!(1000);
        listing["discountedPrice"] = json!(1200);

        let response = app
            .clone()
            .oneshot(create_request(
                "owner-1",
                multipart_body(&listing, &[("a.png", PNG)]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let listed = app
            .oneshot(Request::get("/listings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(listed).await, json!([]));
    }

    #[tokio::test]
    async fn only_owner_may_delete() {
        let (_dir, app) = app().await;
        let response = app
            .clone()
            .oneshot(create_request(
                "owner-1",
                multipart_body(&sunny_loft(), &[("a.png", PNG)]),
            ))
            .await
            .unwrap();
        let created = json_body(response).await;
        let id = created["listing"]["id"].as_str().unwrap().to_string();

        let forbidden = app
            .clone()
            .oneshot(
                Request::delete(format!("/listings/{id}"))
                    .header("x-user-id", "someone-else")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let deleted = app
            .oneshot(
                Request::delete(format!("/listings/{id}"))
                    .header("x-user-id", "owner-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn removing_only_image_is_rejected() {
        let (_dir, app) = app().await;
        let response = app
            .clone()
            .oneshot(create_request(
                "owner-1",
                multipart_body(&sunny_loft(), &[("a.png", PNG)]),
            ))
            .await
            .unwrap();
        let created = json_body(response).await;
        let id = created["listing"]["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::delete(format!("/listings/{id}/images/0"))
                    .header("x-user-id", "owner-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn profile_signup_and_contact_owner() {
        let (_dir, app) = app().await;
        let signup = app
            .clone()
            .oneshot(
                Request::post("/profiles")
                    .header("x-user-id", "owner-1")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"fullName": "Ada Lovelace", "email": "ada@example.org"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(signup.status(), StatusCode::CREATED);
        let profile = json_body(signup).await;
        assert!(profile["username"].as_str().unwrap().starts_with("alovelace"));

        let response = app
            .clone()
            .oneshot(create_request(
                "owner-1",
                multipart_body(&sunny_loft(), &[("a.png", PNG)]),
            ))
            .await
            .unwrap();
        let created = json_body(response).await;
        let id = created["listing"]["id"].as_str().unwrap().to_string();

        let contact = app
            .oneshot(
                Request::post(format!("/listings/{id}/contact"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"message": "Still free?"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(contact.status(), StatusCode::OK);
        let link = json_body(contact).await;
        assert_eq!(
            link["mailto"],
            "mailto:ada@example.org?subject=Sunny%20Loft%20Apt&body=Still%20free%3F"
        );
    }
}
