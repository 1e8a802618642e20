mod common;

use astro_site_backend::entities::services;
use axum::http::StatusCode;
use common::{Part, TestApp};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;

async fn create_city(app: &TestApp, name: &str, slug: &str) -> i64 {
    let (status, body) = app
        .json(
            "POST",
            "/api/cities",
            json!({ "name": name, "slug": slug, "title": format!("{} services", name) }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

async fn create_category(app: &TestApp, name: &str, slug: &str) -> i64 {
    let (status, body) = app
        .json(
            "POST",
            "/api/categories",
            json!({ "name": name, "slug": slug }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_city_lifecycle() {
    let app = TestApp::spawn().await;

    // 1. Create with an image
    let (status, body) = app
        .form(
            "POST",
            "/api/cities",
            &[
                Part::Text("name", "Pune"),
                Part::Text("slug", "pune"),
                Part::Text("title", "Astrologer in Pune"),
                Part::png("image", "skyline.png"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["id"].as_i64().unwrap();
    assert_eq!(body["cityId"], json!(id));
    assert_eq!(body["data"]["status"], json!(1));

    let image = body["data"]["image"].as_str().unwrap().to_string();
    assert!(image.starts_with("/Uploads/cities/"));
    assert!(image.ends_with("skyline.png"));
    assert!(app.asset_exists(&image));

    // 2. Read back
    let (status, list) = app.get("/api/cities").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, city) = app.get(&format!("/api/cities/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(city["slug"], "pune");

    // 3. Filter by slug
    let (_, hits) = app.get("/api/cities?slug=pune").await;
    assert_eq!(hits.as_array().unwrap().len(), 1);
    let (_, misses) = app.get("/api/cities?slug=mumbai").await;
    assert!(misses.as_array().unwrap().is_empty());

    // 4. Status-only update leaves everything else alone
    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/cities/{}", id),
            json!({ "status": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], json!(0));
    assert_eq!(body["name"], "Pune");
    assert_eq!(body["slug"], "pune");
    assert_eq!(body["image"], image.as_str());

    let (_, inactive) = app.get("/api/cities?status=0").await;
    assert_eq!(inactive.as_array().unwrap().len(), 1);

    // 5. Delete
    let (status, body) = app.delete(&format!("/api/cities/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "deleted");

    let (status, body) = app.get(&format!("/api/cities/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn test_missing_required_fields_are_listed() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .json("POST", "/api/cities", json!({ "name": "Pune" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
    assert_eq!(
        body["error"]["message"],
        "Missing required fields: slug, title"
    );

    let (_, list) = app.get("/api/cities").await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let app = TestApp::spawn().await;
    let id = create_city(&app, "Pune", "pune").await;

    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/cities/{}", id),
            json!({ "description": "City of hills" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["description"], "City of hills");
    assert_eq!(body["name"], "Pune");
    assert_eq!(body["title"], "Pune services");

    // Null clears an optional field, a required one refuses it
    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/cities/{}", id),
            json!({ "description": null }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["description"].is_null());

    let (status, body) = app
        .json("PUT", &format!("/api/cities/{}", id), json!({ "name": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "name cannot be empty");
}

#[tokio::test]
async fn test_city_slug_must_be_unique() {
    let app = TestApp::spawn().await;
    create_city(&app, "Pune", "pune").await;
    let other = create_city(&app, "Mumbai", "mumbai").await;

    let (status, body) = app
        .json(
            "POST",
            "/api/cities",
            json!({ "name": "Pune 2", "slug": "pune", "title": "Again" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "conflict");

    let (status, _) = app
        .json(
            "PUT",
            &format!("/api/cities/{}", other),
            json!({ "slug": "pune" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Re-submitting its own slug is fine
    let (status, _) = app
        .json(
            "PUT",
            &format!("/api/cities/{}", other),
            json!({ "slug": "mumbai" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_service_slug_is_unique_per_city() {
    let app = TestApp::spawn().await;
    let pune = create_city(&app, "Pune", "pune").await;
    let mumbai = create_city(&app, "Mumbai", "mumbai").await;
    let category = create_category(&app, "Kundli", "kundli").await;

    let service = |city: i64| {
        json!({
            "city_id": city,
            "category_id": category,
            "name": "Kundli Reading",
            "slug": "kundli-reading",
        })
    };

    let (status, body) = app.json("POST", "/api/services", service(pune)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["city_name"], "Pune");
    assert_eq!(body["data"]["category_slug"], "kundli");

    let (status, body) = app.json("POST", "/api/services", service(pune)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "conflict");

    let (status, body) = app.json("POST", "/api/services", service(mumbai)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let mumbai_service = body["id"].as_i64().unwrap();

    // Moving the Mumbai copy into Pune collides with the existing slug
    let (status, _) = app
        .json(
            "PUT",
            &format!("/api/services/{}", mumbai_service),
            json!({ "city_id": pune }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, pune_services) = app.get(&format!("/api/services?city_id={}", pune)).await;
    assert_eq!(pune_services.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_service_requires_existing_parents() {
    let app = TestApp::spawn().await;
    let category = create_category(&app, "Vastu", "vastu").await;

    let (status, body) = app
        .json(
            "POST",
            "/api/services",
            json!({ "city_id": 999, "category_id": category, "name": "Vastu", "slug": "vastu" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "city 999 does not exist");

    let (status, body) = app
        .json(
            "POST",
            "/api/services",
            json!({ "city_id": "abc", "category_id": category, "name": "Vastu", "slug": "vastu" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "city_id must be an integer");
}

#[tokio::test]
async fn test_city_with_services_cannot_be_deleted() {
    let app = TestApp::spawn().await;
    let city = create_city(&app, "Pune", "pune").await;
    let category = create_category(&app, "Tarot", "tarot").await;

    let (status, body) = app
        .json(
            "POST",
            "/api/services",
            json!({ "city_id": city, "category_id": category, "name": "Tarot", "slug": "tarot" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let service = body["id"].as_i64().unwrap();

    let (status, body) = app.delete(&format!("/api/cities/{}", city)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "conflict");

    let (status, _) = app.delete(&format!("/api/categories/{}", category)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/services/{}", service)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/cities/{}", city)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_service_faqs_round_trip() {
    let app = TestApp::spawn().await;
    let city = create_city(&app, "Pune", "pune").await;
    let category = create_category(&app, "Kundli", "kundli").await;

    let faqs = json!([
        { "question": "How long does it take?", "answer": "About an hour." },
        { "question": "Is it online?", "answer": "Both options are available." }
    ]);

    // Multipart carries the array as a JSON string
    let city_id = city.to_string();
    let category_id = category.to_string();
    let faq_text = faqs.to_string();
    let (status, body) = app
        .form(
            "POST",
            "/api/services",
            &[
                Part::Text("city_id", &city_id),
                Part::Text("category_id", &category_id),
                Part::Text("name", "Kundli"),
                Part::Text("slug", "kundli"),
                Part::Text("faqs", &faq_text),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["id"].as_i64().unwrap();

    let (_, service) = app.get(&format!("/api/services/{}", id)).await;
    assert_eq!(service["faqs"], faqs);

    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/services/{}", id),
            json!({ "faqs": [{ "question": "Missing answer" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/services/{}", id),
            json!({ "faqs": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["faqs"], json!([]));
}

#[tokio::test]
async fn test_malformed_stored_faqs_read_as_empty() {
    let app = TestApp::spawn().await;
    let city = create_city(&app, "Pune", "pune").await;
    let category = create_category(&app, "Kundli", "kundli").await;

    let now = chrono::Utc::now();
    let row = services::ActiveModel {
        city_id: Set(city as i32),
        category_id: Set(category as i32),
        name: Set("Legacy".to_string()),
        slug: Set("legacy".to_string()),
        faqs: Set(Some("{not json".to_string())),
        status: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&app.state.db)
    .await
    .unwrap();

    let (status, service) = app.get(&format!("/api/services/{}", row.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(service["faqs"], json!([]));
}

#[tokio::test]
async fn test_menus_are_ordered_by_position() {
    let app = TestApp::spawn().await;

    for (title, position) in [("Contact", 3), ("Home", 1), ("About", 2)] {
        let (status, _) = app
            .json(
                "POST",
                "/api/menus",
                json!({
                    "title": title,
                    "url": format!("/{}", title.to_lowercase()),
                    "position": position
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, menus) = app.get("/api/menus").await;
    let titles: Vec<&str> = menus
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Home", "About", "Contact"]);
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let app = TestApp::spawn().await;
    create_city(&app, "Pune", "pune").await;
    create_city(&app, "Nashik", "nashik").await;

    let (_, cities) = app.get("/api/cities").await;
    assert_eq!(cities[0]["slug"], "nashik");
    assert_eq!(cities[1]["slug"], "pune");
}

#[tokio::test]
async fn test_invalid_id_and_filter() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/api/cities/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    let (status, _) = app.get("/api/cities?status=active").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unrouted_requests_get_json_errors() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/api/horoscopes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");

    // Singletons are deleted by id only
    let (status, body) = app.delete("/api/about").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"]["kind"], "method_not_allowed");
    assert_eq!(
        body["error"]["message"],
        "DELETE is not supported on /api/about"
    );

    let (status, body) = app.json("PATCH", "/api/cities", json!({})).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"]["kind"], "method_not_allowed");
}
