mod common;

use foodgram_api::{
    error::AppError,
    models::ShoppingListLine,
    services::{cart_service, favorite_service, recipe_service},
};
use uuid::Uuid;

#[tokio::test]
async fn favorite_toggle_rejects_repeats() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let state = &app.state;

    let author = common::create_user(state).await?;
    let fan = common::create_user(state).await?;
    let sugar = common::create_ingredient(state, "sugar", "g").await?;
    let recipe = recipe_service::create_recipe(
        state,
        &author,
        common::recipe_payload("Caramel", &[(sugar, 100)], &[]),
    )
    .await?
    .data
    .expect("recipe");

    let short = favorite_service::add_favorite(state, &fan, recipe.id)
        .await?
        .data
        .expect("short recipe");
    assert_eq!(short.id, recipe.id);
    assert_eq!(short.image, recipe.image);

    let err = favorite_service::add_favorite(state, &fan, recipe.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "Recipe is already in favorites"));

    favorite_service::remove_favorite(state, &fan, recipe.id).await?;
    let err = favorite_service::remove_favorite(state, &fan, recipe.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = favorite_service::add_favorite(state, &fan, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn shopping_list_sums_amounts_across_recipes() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let state = &app.state;

    let author = common::create_user(state).await?;
    let shopper = common::create_user(state).await?;
    // unique names so rows from other tests never merge into these lines
    let flour_name = common::unique("flour");
    let butter_name = common::unique("butter");
    let flour = common::create_ingredient(state, &flour_name, "g").await?;
    let butter = common::create_ingredient(state, &butter_name, "g").await?;

    let cake = recipe_service::create_recipe(
        state,
        &author,
        common::recipe_payload("Cake", &[(flour, 300), (butter, 100)], &[]),
    )
    .await?
    .data
    .expect("recipe");
    let bread = recipe_service::create_recipe(
        state,
        &author,
        common::recipe_payload("Bread", &[(flour, 500)], &[]),
    )
    .await?
    .data
    .expect("recipe");

    assert!(cart_service::shopping_list(state, &shopper).await?.is_empty());
    assert_eq!(cart_service::download_shopping_list(state, &shopper).await?, "");

    cart_service::add_to_cart(state, &shopper, cake.id).await?;
    cart_service::add_to_cart(state, &shopper, bread.id).await?;
    let err = cart_service::add_to_cart(state, &shopper, bread.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let lines = cart_service::shopping_list(state, &shopper).await?;
    assert_eq!(
        lines,
        vec![
            ShoppingListLine {
                name: butter_name.clone(),
                measurement_unit: "g".into(),
                amount: 100,
            },
            ShoppingListLine {
                name: flour_name.clone(),
                measurement_unit: "g".into(),
                amount: 800,
            },
        ]
    );

    let text = cart_service::download_shopping_list(state, &shopper).await?;
    let mut rows = text.lines();
    assert_eq!(rows.next(), Some(format!("B{} - 100 g", &butter_name[1..]).as_str()));
    assert_eq!(rows.next(), Some(format!("F{} - 800 g", &flour_name[1..]).as_str()));
    assert_eq!(rows.next(), None);

    cart_service::remove_from_cart(state, &shopper, cake.id).await?;
    let err = cart_service::remove_from_cart(state, &shopper, cake.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let lines = cart_service::shopping_list(state, &shopper).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].amount, 500);
    Ok(())
}
