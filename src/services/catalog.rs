//! Declarations for every content resource served by the API.

use crate::entities::{categories, cities, prelude::*, services};
use crate::services::resource::{
    Dependent, FieldSpec, ParentRef, ResourceSpec, UniqueKey, column, text_of,
};
use futures::future::BoxFuture;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};

const NEWEST_FIRST: &[(&str, bool)] = &[("id", true)];
const SLUG_UNIQUE: &[UniqueKey] = &[UniqueKey {
    field: "slug",
    scope: None,
}];

pub static CITIES: ResourceSpec = ResourceSpec {
    name: "city",
    asset_dir: "cities",
    fields: &[
        FieldSpec::required_text("name"),
        FieldSpec::required_text("slug"),
        FieldSpec::required_text("title"),
        FieldSpec::text("description"),
        FieldSpec::text("content"),
        FieldSpec::status(),
    ],
    slots: &["image"],
    unique: SLUG_UNIQUE,
    filters: &["slug", "status"],
    parents: &[],
    dependents: &[Dependent {
        label: "services",
        count: services_in_city,
    }],
    order: NEWEST_FIRST,
    decorate: None,
};

pub static CATEGORIES: ResourceSpec = ResourceSpec {
    name: "category",
    asset_dir: "categories",
    fields: &[
        FieldSpec::required_text("name"),
        FieldSpec::required_text("slug"),
        FieldSpec::text("description"),
        FieldSpec::status(),
    ],
    slots: &["image"],
    unique: SLUG_UNIQUE,
    filters: &["slug", "status"],
    parents: &[],
    dependents: &[Dependent {
        label: "services",
        count: services_in_category,
    }],
    order: NEWEST_FIRST,
    decorate: None,
};

pub static SERVICES: ResourceSpec = ResourceSpec {
    name: "service",
    asset_dir: "services",
    fields: &[
        FieldSpec::required_int("city_id"),
        FieldSpec::required_int("category_id"),
        FieldSpec::required_text("name"),
        FieldSpec::required_text("slug"),
        FieldSpec::text("title"),
        FieldSpec::text("short_description"),
        FieldSpec::text("content"),
        FieldSpec::faqs("faqs"),
        FieldSpec::status(),
    ],
    slots: &["image"],
    unique: &[UniqueKey {
        field: "slug",
        scope: Some("city_id"),
    }],
    filters: &["slug", "city_id", "category_id", "status"],
    parents: &[
        ParentRef {
            field: "city_id",
            label: "city",
            exists: city_exists,
        },
        ParentRef {
            field: "category_id",
            label: "category",
            exists: category_exists,
        },
    ],
    dependents: &[],
    order: NEWEST_FIRST,
    decorate: Some(with_city_and_category),
};

pub static BANNERS: ResourceSpec = ResourceSpec {
    name: "banner",
    asset_dir: "banners",
    fields: &[
        FieldSpec::text("title"),
        FieldSpec::text("subtitle"),
        FieldSpec::text("link"),
        FieldSpec::status(),
    ],
    slots: &[
        "desktop_image1",
        "desktop_image2",
        "desktop_image3",
        "mob_image1",
        "mob_image2",
        "mob_image3",
    ],
    unique: &[],
    filters: &["status"],
    parents: &[],
    dependents: &[],
    order: NEWEST_FIRST,
    decorate: None,
};

pub static BLOGS: ResourceSpec = ResourceSpec {
    name: "blog",
    asset_dir: "blogs",
    fields: &[
        FieldSpec::required_text("title"),
        FieldSpec::required_text("slug"),
        FieldSpec::text("author"),
        FieldSpec::text("excerpt"),
        FieldSpec::required_text("content"),
        FieldSpec::text("meta_title"),
        FieldSpec::text("meta_description"),
        FieldSpec::status(),
    ],
    slots: &["image"],
    unique: SLUG_UNIQUE,
    filters: &["slug", "status"],
    parents: &[],
    dependents: &[],
    order: NEWEST_FIRST,
    decorate: None,
};

pub static TESTIMONIALS: ResourceSpec = ResourceSpec {
    name: "testimonial",
    asset_dir: "testimonials",
    fields: &[
        FieldSpec::required_text("name"),
        FieldSpec::text("designation"),
        FieldSpec::required_text("message"),
        FieldSpec::int("rating"),
        FieldSpec::status(),
    ],
    slots: &["image"],
    unique: &[],
    filters: &["status"],
    parents: &[],
    dependents: &[],
    order: NEWEST_FIRST,
    decorate: None,
};

pub static AWARDS: ResourceSpec = ResourceSpec {
    name: "award",
    asset_dir: "awards",
    fields: &[
        FieldSpec::required_text("title"),
        FieldSpec::text("description"),
        FieldSpec::int("year"),
        FieldSpec::status(),
    ],
    slots: &["image"],
    unique: &[],
    filters: &["status"],
    parents: &[],
    dependents: &[],
    order: NEWEST_FIRST,
    decorate: None,
};

pub static CONTACTS: ResourceSpec = ResourceSpec {
    name: "contact",
    asset_dir: "contacts",
    fields: &[
        FieldSpec::required_text("name"),
        FieldSpec::required_text("email"),
        FieldSpec::text("phone"),
        FieldSpec::text("subject"),
        FieldSpec::required_text("message"),
    ],
    slots: &[],
    unique: &[],
    filters: &[],
    parents: &[],
    dependents: &[],
    order: NEWEST_FIRST,
    decorate: None,
};

pub static APPOINTMENTS: ResourceSpec = ResourceSpec {
    name: "appointment",
    asset_dir: "appointments",
    fields: &[
        FieldSpec::required_text("name"),
        FieldSpec::required_text("phone"),
        FieldSpec::text("email"),
        FieldSpec::text("service"),
        FieldSpec::text("preferred_date"),
        FieldSpec::text("preferred_time"),
        FieldSpec::text("message"),
    ],
    slots: &[],
    unique: &[],
    filters: &[],
    parents: &[],
    dependents: &[],
    order: NEWEST_FIRST,
    decorate: None,
};

pub static MENUS: ResourceSpec = ResourceSpec {
    name: "menu",
    asset_dir: "menus",
    fields: &[
        FieldSpec::required_text("title"),
        FieldSpec::required_text("url"),
        FieldSpec::int("parent_id"),
        FieldSpec::int_default("position", 0),
        FieldSpec::status(),
    ],
    slots: &[],
    unique: &[],
    filters: &["parent_id", "status"],
    parents: &[],
    dependents: &[],
    order: &[("position", false), ("id", false)],
    decorate: None,
};

pub static HOME_SETTING: ResourceSpec = ResourceSpec {
    name: "home_setting",
    asset_dir: "home_setting",
    fields: &[
        FieldSpec::text("site_title"),
        FieldSpec::text("tagline"),
        FieldSpec::text("hero_title"),
        FieldSpec::text("hero_subtitle"),
        FieldSpec::text("phone"),
        FieldSpec::text("email"),
        FieldSpec::text("address"),
    ],
    slots: &["logo", "favicon", "hero_image"],
    unique: &[],
    filters: &[],
    parents: &[],
    dependents: &[],
    order: &[],
    decorate: None,
};

pub static ABOUT: ResourceSpec = ResourceSpec {
    name: "about",
    asset_dir: "about",
    fields: &[
        FieldSpec::text("title"),
        FieldSpec::text("subtitle"),
        FieldSpec::text("content"),
        FieldSpec::text("mission"),
        FieldSpec::text("vision"),
    ],
    slots: &["image"],
    unique: &[],
    filters: &[],
    parents: &[],
    dependents: &[],
    order: &[],
    decorate: None,
};

pub static SEO: ResourceSpec = ResourceSpec {
    name: "seo",
    asset_dir: "seo",
    fields: &[
        FieldSpec::text("meta_title"),
        FieldSpec::text("meta_description"),
        FieldSpec::text("meta_keywords"),
    ],
    slots: &["og_image"],
    unique: &[],
    filters: &[],
    parents: &[],
    dependents: &[],
    order: &[],
    decorate: None,
};

pub static BEST_SOLUTION: ResourceSpec = ResourceSpec {
    name: "best_solution",
    asset_dir: "best_solution",
    fields: &[
        FieldSpec::text("title"),
        FieldSpec::text("description"),
        FieldSpec::text("button_text"),
        FieldSpec::text("button_link"),
    ],
    slots: &["image"],
    unique: &[],
    filters: &[],
    parents: &[],
    dependents: &[],
    order: &[],
    decorate: None,
};

fn city_exists(db: &DatabaseConnection, id: i32) -> BoxFuture<'_, Result<bool, DbErr>> {
    Box::pin(async move { Ok(Cities::find_by_id(id).one(db).await?.is_some()) })
}

fn category_exists(db: &DatabaseConnection, id: i32) -> BoxFuture<'_, Result<bool, DbErr>> {
    Box::pin(async move { Ok(Categories::find_by_id(id).one(db).await?.is_some()) })
}

fn services_in_city(db: &DatabaseConnection, id: i32) -> BoxFuture<'_, Result<u64, DbErr>> {
    Box::pin(async move {
        Services::find()
            .filter(services::Column::CityId.eq(id))
            .count(db)
            .await
    })
}

fn services_in_category(db: &DatabaseConnection, id: i32) -> BoxFuture<'_, Result<u64, DbErr>> {
    Box::pin(async move {
        Services::find()
            .filter(services::Column::CategoryId.eq(id))
            .count(db)
            .await
    })
}

/// Adds `city_name`, `city_slug`, `category_name` and `category_slug` to
/// service rows. Missing parents yield nulls.
fn with_city_and_category(
    db: &DatabaseConnection,
    mut rows: Vec<Value>,
) -> BoxFuture<'_, Result<Vec<Value>, DbErr>> {
    Box::pin(async move {
        let ids = |key: &str| -> Vec<i32> {
            rows.iter()
                .filter_map(|r| r.get(key).and_then(Value::as_i64))
                .map(|n| n as i32)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect()
        };
        let city_ids = ids("city_id");
        let category_ids = ids("category_id");

        let city_map: HashMap<i32, cities::Model> = Cities::find()
            .filter(cities::Column::Id.is_in(city_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let category_map: HashMap<i32, categories::Model> = Categories::find()
            .filter(categories::Column::Id.is_in(category_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        for row in rows.iter_mut() {
            let city = row
                .get("city_id")
                .and_then(Value::as_i64)
                .and_then(|id| city_map.get(&(id as i32)));
            let category = row
                .get("category_id")
                .and_then(Value::as_i64)
                .and_then(|id| category_map.get(&(id as i32)));

            if let Some(obj) = row.as_object_mut() {
                obj.insert("city_name".into(), json!(city.map(|c| &c.name)));
                obj.insert("city_slug".into(), json!(city.map(|c| &c.slug)));
                obj.insert("category_name".into(), json!(category.map(|c| &c.name)));
                obj.insert("category_slug".into(), json!(category.map(|c| &c.slug)));
            }
        }

        Ok(rows)
    })
}

type Paths<'a> = BoxFuture<'a, Result<Vec<String>, DbErr>>;
type ReferencedFn = for<'a> fn(&'a DatabaseConnection, &'static [&'static str]) -> Paths<'a>;

/// A table whose image columns point into one asset directory.
pub struct AssetOwner {
    pub spec: &'static ResourceSpec,
    referenced: ReferencedFn,
}

impl AssetOwner {
    const fn of<E: EntityTrait>(spec: &'static ResourceSpec) -> Self {
        Self {
            spec,
            referenced: referenced_by::<E>,
        }
    }

    /// Every stored path currently held by the table's image columns.
    pub fn referenced<'a>(&self, db: &'a DatabaseConnection) -> Paths<'a> {
        (self.referenced)(db, self.spec.slots)
    }
}

fn referenced_by<'a, E: EntityTrait>(
    db: &'a DatabaseConnection,
    slots: &'static [&'static str],
) -> Paths<'a> {
    Box::pin(async move {
        let rows = E::find().all(db).await?;
        let mut paths = Vec::new();
        for &slot in slots {
            let col = column::<E>(slot).map_err(|e| DbErr::Custom(e.to_string()))?;
            paths.extend(rows.iter().filter_map(|row| text_of(row, col)));
        }
        Ok(paths)
    })
}

/// Resources that own files in the asset store.
pub static ASSET_OWNERS: &[AssetOwner] = &[
    AssetOwner::of::<Cities>(&CITIES),
    AssetOwner::of::<Categories>(&CATEGORIES),
    AssetOwner::of::<Services>(&SERVICES),
    AssetOwner::of::<Banners>(&BANNERS),
    AssetOwner::of::<Blogs>(&BLOGS),
    AssetOwner::of::<Testimonials>(&TESTIMONIALS),
    AssetOwner::of::<Awards>(&AWARDS),
    AssetOwner::of::<HomeSetting>(&HOME_SETTING),
    AssetOwner::of::<About>(&ABOUT),
    AssetOwner::of::<Seo>(&SEO),
    AssetOwner::of::<BestSolution>(&BEST_SOLUTION),
];
