mod common;

use foodgram_api::{
    dto::catalog::{CreateIngredientRequest, CreateTagRequest},
    error::AppError,
    routes::params::IngredientQuery,
    services::catalog_service,
};

#[tokio::test]
async fn admin_manages_tags() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let state = &app.state;
    let admin = common::create_admin(state).await?;
    let user = common::create_user(state).await?;
    let slug = common::unique("brunch");

    let request = |color: Option<&str>| CreateTagRequest {
        name: "Brunch".into(),
        color: color.map(str::to_string),
        slug: slug.clone(),
    };

    let err = catalog_service::create_tag(state, &user, request(None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = catalog_service::create_tag(state, &admin, request(Some("orange")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let tag = catalog_service::create_tag(state, &admin, request(None))
        .await?
        .data
        .expect("tag");
    assert_eq!(tag.color, "#ffffff");
    assert_eq!(tag.slug, slug);

    let err = catalog_service::create_tag(state, &admin, request(Some("#abc")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("slug")));

    let fetched = catalog_service::get_tag(state, tag.id).await?.data.expect("tag");
    assert_eq!(fetched.name, "Brunch");
    let all = catalog_service::list_tags(state).await?.data.expect("tags").items;
    assert!(all.iter().any(|t| t.id == tag.id));
    Ok(())
}

#[tokio::test]
async fn ingredient_search_matches_name_prefix() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let state = &app.state;
    let admin = common::create_admin(state).await?;
    let prefix = common::unique("zz");

    for name in [format!("{prefix}_apple"), format!("{prefix}_apricot")] {
        catalog_service::create_ingredient(
            state,
            &admin,
            CreateIngredientRequest {
                name,
                measurement_unit: "g".into(),
            },
        )
        .await?;
    }
    let banana = common::create_ingredient(state, &format!("banana {prefix}"), "pcs").await?;

    let search = |name: String| IngredientQuery { name: Some(name) };

    let found = catalog_service::list_ingredients(state, search(format!("{prefix}_AP")))
        .await?
        .data
        .expect("ingredients")
        .items;
    let names: Vec<&str> = found.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(
        names,
        vec![format!("{prefix}_apple"), format!("{prefix}_apricot")]
    );

    // prefix only, and `_` is not a wildcard
    let found = catalog_service::list_ingredients(state, search(format!("{prefix}_apr")))
        .await?
        .data
        .expect("ingredients")
        .items;
    assert_eq!(found.len(), 1);
    let none = catalog_service::list_ingredients(state, search(prefix.replace('_', "%")))
        .await?
        .data
        .expect("ingredients")
        .items;
    assert!(none.is_empty());

    let fetched = catalog_service::get_ingredient(state, banana).await?.data.expect("ingredient");
    assert_eq!(fetched.measurement_unit, "pcs");

    let user = common::create_user(state).await?;
    let err = catalog_service::create_ingredient(
        state,
        &user,
        CreateIngredientRequest {
            name: "forbidden fruit".into(),
            measurement_unit: "pcs".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}
