use std::{sync::Arc, time::Duration};

use chrono::Utc;
use db::models::{
    recipe::Recipe,
    user_profile::{CreateUserProfile, UserProfile},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use ts_rs::TS;

use super::{
    identity::AuthUser,
    object_store::{ObjectStore, keys},
    recipes::{RecipeService, RecipeServiceError, RecipeView},
    validation::{self, ImageUpload, PROFILE_PICTURE, ValidationErrors},
};

pub const POINTS_PER_RECIPE: i64 = 100;
pub const POINTS_PER_LIKE: i64 = 10;

/// Mock coupon ladder: (code, description, points needed).
const COUPONS: [(&str, &str, i64); 3] = [
    ("WELCOME5", "5% off your next grocery order", 0),
    ("FRESH10", "10% off fresh produce", 500),
    ("CHEF20", "20% off the NoName pantry range", 1500),
];

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    pub description: String,
    pub points_required: i64,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub recipes_uploaded: i64,
    pub total_likes: i64,
    pub pco_points: i64,
    pub coupons: Vec<Coupon>,
}

impl ProfileStats {
    pub fn from_totals(recipes_uploaded: i64, total_likes: i64) -> Self {
        let pco_points = recipes_uploaded * POINTS_PER_RECIPE + total_likes * POINTS_PER_LIKE;
        let coupons = COUPONS
            .iter()
            .map(|(code, description, points_required)| Coupon {
                code: code.to_string(),
                description: description.to_string(),
                points_required: *points_required,
                unlocked: pco_points >= *points_required,
            })
            .collect();
        Self {
            recipes_uploaded,
            total_likes,
            pco_points,
            coupons,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    pool: SqlitePool,
    storage: Arc<dyn ObjectStore>,
    recipes: RecipeService,
    signed_url_ttl: Duration,
    max_image_bytes: usize,
}

impl ProfileService {
    pub fn new(
        pool: SqlitePool,
        storage: Arc<dyn ObjectStore>,
        signed_url_ttl: Duration,
        max_image_bytes: usize,
    ) -> Self {
        let recipes = RecipeService::new(
            pool.clone(),
            storage.clone(),
            signed_url_ttl,
            max_image_bytes,
        );
        Self {
            pool,
            storage,
            recipes,
            signed_url_ttl,
            max_image_bytes,
        }
    }

    async fn ensure_profile(&self, user: &AuthUser) -> Result<UserProfile, sqlx::Error> {
        UserProfile::find_or_create(
            &self.pool,
            &CreateUserProfile {
                uid: user.uid.clone(),
                email: user.email.clone(),
                display_name: Some(user.display_name.clone()),
            },
        )
        .await
    }

    async fn view(&self, profile: UserProfile) -> Result<ProfileView, RecipeServiceError> {
        let photo_url = match &profile.photo_key {
            Some(key) => Some(self.storage.signed_url(key, self.signed_url_ttl).await?),
            None => None,
        };
        Ok(ProfileView { profile, photo_url })
    }

    pub async fn get_profile(&self, user: &AuthUser) -> Result<ProfileView, RecipeServiceError> {
        let profile = self.ensure_profile(user).await?;
        self.view(profile).await
    }

    pub async fn update_profile(
        &self,
        user: &AuthUser,
        update: UpdateProfile,
    ) -> Result<ProfileView, RecipeServiceError> {
        let mut errors = Vec::new();
        let first_name = validation::validate_profile_name("firstName", update.first_name.as_deref())
            .map_err(|e| errors.push(e))
            .ok()
            .flatten();
        let last_name = validation::validate_profile_name("lastName", update.last_name.as_deref())
            .map_err(|e| errors.push(e))
            .ok()
            .flatten();
        if !errors.is_empty() {
            return Err(ValidationErrors(errors).into());
        }

        self.ensure_profile(user).await?;
        let profile =
            UserProfile::update_names(&self.pool, &user.uid, first_name.as_deref(), last_name.as_deref())
                .await?
                .ok_or(RecipeServiceError::NotFound)?;
        self.view(profile).await
    }

    /// Store a new profile picture, then drop the previous one.
    pub async fn upload_profile_picture(
        &self,
        user: &AuthUser,
        image: Option<ImageUpload>,
    ) -> Result<ProfileView, RecipeServiceError> {
        validation::validate_image(image.as_ref(), PROFILE_PICTURE, self.max_image_bytes).map_err(
            |e| {
                if e.code == PROFILE_PICTURE.missing {
                    RecipeServiceError::MissingData(e)
                } else {
                    ValidationErrors::from(e).into()
                }
            },
        )?;
        let Some(image) = image else {
            return Err(RecipeServiceError::MissingFields(vec!["profilePicture"]));
        };

        let previous = self.ensure_profile(user).await?.photo_key;
        let key = keys::profile_picture(&user.uid, &image.file_name, Utc::now());
        self.storage.put(&key, image.bytes, &image.content_type).await?;

        let profile = match UserProfile::update_photo_key(&self.pool, &user.uid, &key).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                RecipeService::discard_object(self.storage.as_ref(), &key).await;
                return Err(RecipeServiceError::NotFound);
            }
            Err(e) => {
                RecipeService::discard_object(self.storage.as_ref(), &key).await;
                return Err(e.into());
            }
        };

        if let Some(previous) = previous.filter(|p| *p != key) {
            RecipeService::discard_object(self.storage.as_ref(), &previous).await;
        }
        info!(user_id = %user.uid, key = %key, "Profile picture updated");
        self.view(profile).await
    }

    pub async fn profile_stats(&self, user: &AuthUser) -> Result<ProfileStats, RecipeServiceError> {
        let (recipes, likes) = Recipe::author_totals(&self.pool, &user.uid).await?;
        Ok(ProfileStats::from_totals(recipes, likes))
    }

    pub async fn user_recipes(
        &self,
        user: &AuthUser,
    ) -> Result<Vec<RecipeView>, RecipeServiceError> {
        self.recipes.recipes_by_author(&user.uid).await
    }
}
