//! Field rules for the recipe, draft, comment and profile forms.
//!
//! Every check reports a fixed error code alongside a human message and the
//! offending field, and form-level validation collects all failures.

use bytes::Bytes;
use db::models::recipe::RecipeIngredient;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use utils::text::trimmed_len;

pub const RECIPE_NAME_LEN: (usize, usize) = (3, 100);
pub const BRIEF_INGREDIENTS_LEN: (usize, usize) = (10, 500);
pub const FULL_RECIPE_LEN: (usize, usize) = (20, 5000);
pub const INGREDIENT_COUNT: (usize, usize) = (1, 50);
pub const COMMENT_LEN: (usize, usize) = (1, 1000);
pub const PROFILE_NAME_MAX: usize = 50;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// A file part received from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub code: &'static str,
    pub message: String,
    pub field: &'static str,
}

impl FieldError {
    pub fn new(code: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn codes(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.code).collect()
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

/// Raw direct-upload form, as read off the wire.
#[derive(Debug, Clone, Default)]
pub struct RecipeUploadForm {
    pub recipe_name: Option<String>,
    pub brief_ingredients: Option<String>,
    pub full_recipe: Option<String>,
    pub ingredients: Option<String>,
    pub recipe_image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct ValidatedRecipe {
    pub recipe_name: String,
    pub brief_ingredients: String,
    pub full_recipe: String,
    pub ingredients: Vec<RecipeIngredient>,
    pub recipe_image: ImageUpload,
}

/// First step of the draft flow.
#[derive(Debug, Clone, Default)]
pub struct DraftGenerateForm {
    pub name: Option<String>,
    pub brief_description: Option<String>,
    pub recipe_image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct ValidatedDraftRequest {
    pub name: String,
    pub brief_description: String,
    pub recipe_image: ImageUpload,
}

/// Second step of the draft flow. Text fields only; the image comes from the draft.
#[derive(Debug, Clone, Default)]
pub struct DraftSubmitForm {
    pub recipe_name: Option<String>,
    pub brief_ingredients: Option<String>,
    pub full_recipe: Option<String>,
    pub ingredients: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentForm {
    pub text: Option<String>,
    pub image: Option<ImageUpload>,
}

struct TextRule {
    field: &'static str,
    label: &'static str,
    bounds: (usize, usize),
    missing: &'static str,
    too_short: &'static str,
    too_long: &'static str,
}

const RECIPE_NAME: TextRule = TextRule {
    field: "recipeName",
    label: "Recipe name",
    bounds: RECIPE_NAME_LEN,
    missing: "INVALID_RECIPE_NAME",
    too_short: "RECIPE_NAME_TOO_SHORT",
    too_long: "RECIPE_NAME_TOO_LONG",
};

const BRIEF_INGREDIENTS: TextRule = TextRule {
    field: "briefIngredients",
    label: "Brief ingredients",
    bounds: BRIEF_INGREDIENTS_LEN,
    missing: "INVALID_BRIEF_INGREDIENTS",
    too_short: "BRIEF_INGREDIENTS_TOO_SHORT",
    too_long: "BRIEF_INGREDIENTS_TOO_LONG",
};

const FULL_RECIPE: TextRule = TextRule {
    field: "fullRecipe",
    label: "Full recipe",
    bounds: FULL_RECIPE_LEN,
    missing: "INVALID_FULL_RECIPE",
    too_short: "FULL_RECIPE_TOO_SHORT",
    too_long: "FULL_RECIPE_TOO_LONG",
};

impl TextRule {
    fn check(&self, value: Option<&str>) -> Result<String, FieldError> {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            return Err(FieldError::new(
                self.missing,
                self.field,
                format!("{} is required", self.label),
            ));
        };
        let (min, max) = self.bounds;
        let len = trimmed_len(value);
        if len < min {
            return Err(FieldError::new(
                self.too_short,
                self.field,
                format!("{} must be at least {min} characters", self.label),
            ));
        }
        if len > max {
            return Err(FieldError::new(
                self.too_long,
                self.field,
                format!("{} must be no more than {max} characters", self.label),
            ));
        }
        Ok(value.trim().to_string())
    }

    /// Same as [`Self::check`] but against another form field name.
    fn check_as(&self, field: &'static str, value: Option<&str>) -> Result<String, FieldError> {
        self.check(value).map_err(|mut e| {
            e.field = field;
            e
        })
    }
}

fn collect<T>(result: Result<T, FieldError>, errors: &mut Vec<FieldError>) -> Option<T> {
    result.map_err(|e| errors.push(e)).ok()
}

pub fn validate_recipe_name(value: Option<&str>) -> Result<String, FieldError> {
    RECIPE_NAME.check(value)
}

pub fn validate_brief_ingredients(value: Option<&str>) -> Result<String, FieldError> {
    BRIEF_INGREDIENTS.check(value)
}

pub fn validate_full_recipe(value: Option<&str>) -> Result<String, FieldError> {
    FULL_RECIPE.check(value)
}

/// A file input checked by [`validate_image`].
#[derive(Debug, Clone, Copy)]
pub struct ImageField {
    pub field: &'static str,
    pub label: &'static str,
    /// Code reported when the part is absent or empty.
    pub missing: &'static str,
}

pub const RECIPE_IMAGE: ImageField = ImageField {
    field: "recipeImage",
    label: "Recipe image",
    missing: "INVALID_RECIPE_IMAGE",
};

pub const PROFILE_PICTURE: ImageField = ImageField {
    field: "profilePicture",
    label: "Profile picture",
    missing: "MISSING_DATA",
};

pub const COMMENT_IMAGE: ImageField = ImageField {
    field: "image",
    label: "Comment image",
    missing: "INVALID_COMMENT_IMAGE",
};

/// Check presence, size and content type of an image part, in that order.
pub fn validate_image(
    image: Option<&ImageUpload>,
    input: ImageField,
    max_bytes: usize,
) -> Result<(), FieldError> {
    let field = input.field;
    let Some(image) = image.filter(|i| !i.bytes.is_empty()) else {
        return Err(FieldError::new(
            input.missing,
            field,
            format!("{} is required", input.label),
        ));
    };
    if image.size() > max_bytes {
        return Err(FieldError::new(
            "FILE_TOO_LARGE",
            field,
            format!(
                "Image file must be smaller than {}MB",
                max_bytes / (1024 * 1024)
            ),
        ));
    }
    let content_type = image.content_type.to_ascii_lowercase();
    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(FieldError::new(
            "INVALID_FILE_TYPE",
            field,
            format!("Image must be one of: {}", ALLOWED_IMAGE_TYPES.join(", ")),
        ));
    }
    Ok(())
}

/// Parse the JSON ingredient list sent with a recipe.
pub fn parse_ingredients(raw: Option<&str>) -> Result<Vec<RecipeIngredient>, FieldError> {
    const FIELD: &str = "ingredients";

    let raw = raw
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| FieldError::new("INVALID_INGREDIENTS", FIELD, "Ingredients are required"))?;

    let value: Value = serde_json::from_str(raw).map_err(|e| {
        FieldError::new(
            "INVALID_INGREDIENTS_FORMAT",
            FIELD,
            format!("Ingredients must be valid JSON: {e}"),
        )
    })?;
    let Value::Array(items) = value else {
        return Err(FieldError::new(
            "INGREDIENTS_NOT_ARRAY",
            FIELD,
            "Ingredients must be an array",
        ));
    };

    let (min, max) = INGREDIENT_COUNT;
    if items.len() < min {
        return Err(FieldError::new(
            "TOO_FEW_INGREDIENTS",
            FIELD,
            format!("At least {min} ingredient is required"),
        ));
    }
    if items.len() > max {
        return Err(FieldError::new(
            "TOO_MANY_INGREDIENTS",
            FIELD,
            format!("No more than {max} ingredients allowed"),
        ));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let invalid = || {
                FieldError::new(
                    "INVALID_INGREDIENT",
                    FIELD,
                    format!("Ingredient {} must have both name and quantity", index + 1),
                )
            };
            let ingredient: RecipeIngredient =
                serde_json::from_value(item).map_err(|_| invalid())?;
            if ingredient.name.trim().is_empty() || ingredient.quantity.trim().is_empty() {
                return Err(invalid());
            }
            Ok(RecipeIngredient {
                name: ingredient.name.trim().to_string(),
                quantity: ingredient.quantity.trim().to_string(),
                ..ingredient
            })
        })
        .collect()
}

/// Validate the direct-upload form, reporting every failing field.
pub fn validate_upload(
    form: RecipeUploadForm,
    max_image_bytes: usize,
) -> Result<ValidatedRecipe, ValidationErrors> {
    let mut errors = Vec::new();

    let recipe_name = collect(validate_recipe_name(form.recipe_name.as_deref()), &mut errors);
    let brief_ingredients = collect(
        validate_brief_ingredients(form.brief_ingredients.as_deref()),
        &mut errors,
    );
    let full_recipe = collect(validate_full_recipe(form.full_recipe.as_deref()), &mut errors);
    let ingredients = collect(parse_ingredients(form.ingredients.as_deref()), &mut errors);
    collect(
        validate_image(form.recipe_image.as_ref(), RECIPE_IMAGE, max_image_bytes),
        &mut errors,
    );

    match (
        recipe_name,
        brief_ingredients,
        full_recipe,
        ingredients,
        form.recipe_image,
    ) {
        (Some(recipe_name), Some(brief_ingredients), Some(full_recipe), Some(ingredients), Some(recipe_image))
            if errors.is_empty() =>
        {
            Ok(ValidatedRecipe {
                recipe_name,
                brief_ingredients,
                full_recipe,
                ingredients,
                recipe_image,
            })
        }
        _ => Err(ValidationErrors(errors)),
    }
}

pub fn validate_draft_request(
    form: DraftGenerateForm,
    max_image_bytes: usize,
) -> Result<ValidatedDraftRequest, ValidationErrors> {
    let mut errors = Vec::new();

    let name = collect(RECIPE_NAME.check_as("name", form.name.as_deref()), &mut errors);
    let brief_description = collect(
        BRIEF_INGREDIENTS.check_as("briefDescription", form.brief_description.as_deref()),
        &mut errors,
    );
    collect(
        validate_image(form.recipe_image.as_ref(), RECIPE_IMAGE, max_image_bytes),
        &mut errors,
    );

    match (name, brief_description, form.recipe_image) {
        (Some(name), Some(brief_description), Some(recipe_image)) if errors.is_empty() => {
            Ok(ValidatedDraftRequest {
                name,
                brief_description,
                recipe_image,
            })
        }
        _ => Err(ValidationErrors(errors)),
    }
}

pub fn validate_comment(text: Option<&str>) -> Result<String, FieldError> {
    const FIELD: &str = "text";
    let (_, max) = COMMENT_LEN;
    let text = text.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(FieldError::new("INVALID_COMMENT", FIELD, "Comment text is required"));
    }
    if trimmed_len(text) > max {
        return Err(FieldError::new(
            "INVALID_COMMENT",
            FIELD,
            format!("Comment must be no more than {max} characters"),
        ));
    }
    Ok(text.to_string())
}

/// Trim an optional profile name. Blank input is treated as absent.
pub fn validate_profile_name(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<String>, FieldError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if trimmed_len(value) > PROFILE_NAME_MAX {
        return Err(FieldError::new(
            "INVALID_PROFILE_NAME",
            field,
            format!("Name must be no more than {PROFILE_NAME_MAX} characters"),
        ));
    }
    Ok(Some(value.to_string()))
}
