//! Turns a recipe name plus free-text ingredients into a full recipe and a
//! structured ingredient list matched against the store catalog.

use async_trait::async_trait;
use db::models::{recipe_draft::ExtractedIngredient, store_product::StoreProduct};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::claude_api::{ClaudeApiClient, ClaudeApiError};

const DEFAULT_QUANTITY: &str = "1 unit";

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("llm error: {0}")]
    ClaudeApi(#[from] ClaudeApiError),
    #[error("generator returned no usable recipe: {0}")]
    EmptyResult(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRecipe {
    /// Markdown body of the recipe.
    pub full_recipe: String,
    pub ingredients: Vec<ExtractedIngredient>,
}

#[async_trait]
pub trait RecipeGenerator: Send + Sync {
    async fn generate(
        &self,
        recipe_name: &str,
        brief_description: &str,
        catalog: &[StoreProduct],
    ) -> Result<GeneratedRecipe, GeneratorError>;
}

/// Split a free-text ingredient list on commas, semicolons and newlines.
pub fn split_ingredients(description: &str) -> Vec<String> {
    description
        .split([',', ';', '\n'])
        .map(|part| part.trim().trim_start_matches(['-', '*']).trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// First catalog product whose keyword names `ingredient`.
///
/// The keyword must appear as a whole word, optionally pluralised with `s`
/// or `es`, so "eggs" matches `egg` but "eggplant" does not. Callers pass the
/// catalog most-specific-first.
pub fn match_product<'a>(ingredient: &str, catalog: &'a [StoreProduct]) -> Option<&'a StoreProduct> {
    let haystack = ingredient.to_lowercase();
    catalog
        .iter()
        .find(|product| contains_term(&haystack, &product.keyword.to_lowercase()))
}

fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    haystack.match_indices(term).any(|(start, _)| {
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let rest = &haystack[start + term.len()..];
        let rest = rest
            .strip_prefix("es")
            .or_else(|| rest.strip_prefix('s'))
            .filter(|r| r.chars().next().is_none_or(|c| !c.is_alphanumeric()))
            .unwrap_or(rest);
        let after_ok = rest.chars().next().is_none_or(|c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

/// Offline generator: a markdown template around the comma separated list.
#[derive(Debug, Default, Clone)]
pub struct TemplateRecipeGenerator;

#[async_trait]
impl RecipeGenerator for TemplateRecipeGenerator {
    async fn generate(
        &self,
        recipe_name: &str,
        brief_description: &str,
        catalog: &[StoreProduct],
    ) -> Result<GeneratedRecipe, GeneratorError> {
        let items = split_ingredients(brief_description);
        if items.is_empty() {
            return Err(GeneratorError::EmptyResult(
                "no ingredients in description".to_string(),
            ));
        }

        let ingredient_lines: Vec<String> = items.iter().map(|i| format!("- {i}")).collect();
        let full_recipe = format!(
            "# {recipe_name}\n\n\
             ## Ingredients\n{ingredients}\n\n\
             ## Instructions\n\
             1. Prepare your ingredients: {brief}.\n\
             2. Cook the main components according to their requirements.\n\
             3. Combine all ingredients in the proper order.\n\
             4. Season to taste and adjust flavors as needed.\n\
             5. Serve and enjoy your {recipe_name}!\n\n\
             ## Tips\n\
             - Fresh ingredients give the best flavor.\n\
             - Adjust cooking times to your preference.",
            ingredients = ingredient_lines.join("\n"),
            brief = items.join(", "),
        );

        let ingredients = items
            .iter()
            .enumerate()
            .map(|(index, name)| ExtractedIngredient {
                id: format!("ing-{index}"),
                name: name.clone(),
                quantity: DEFAULT_QUANTITY.to_string(),
                store_product: match_product(name, catalog).cloned(),
            })
            .collect();

        Ok(GeneratedRecipe {
            full_recipe,
            ingredients,
        })
    }
}

const SYSTEM_PROMPT: &str = "You are an expert culinary assistant for a grocery store's recipe community. \
You write clear home-cooking recipes and map ingredients to the store's own products. \
Always answer with a single JSON object and nothing else.";

#[derive(Debug, Deserialize)]
struct LlmRecipeReply {
    recipe: String,
    #[serde(default)]
    ingredients: Vec<LlmIngredient>,
}

#[derive(Debug, Deserialize)]
struct LlmIngredient {
    name: String,
    #[serde(default)]
    quantity: Option<String>,
    #[serde(default)]
    store_product_id: Option<String>,
}

/// Generator backed by the hosted LLM.
#[derive(Debug, Clone)]
pub struct LlmRecipeGenerator {
    claude: ClaudeApiClient,
}

impl LlmRecipeGenerator {
    const MAX_TOKENS: u32 = 2048;

    pub fn new(claude: ClaudeApiClient) -> Self {
        Self { claude }
    }
}

#[async_trait]
impl RecipeGenerator for LlmRecipeGenerator {
    async fn generate(
        &self,
        recipe_name: &str,
        brief_description: &str,
        catalog: &[StoreProduct],
    ) -> Result<GeneratedRecipe, GeneratorError> {
        let prompt = build_prompt(recipe_name, brief_description, catalog);
        debug!(model = self.claude.model(), prompt_len = prompt.len(), "Requesting recipe generation");

        let reply: LlmRecipeReply = self
            .claude
            .ask_json(&prompt, Some(SYSTEM_PROMPT), Self::MAX_TOKENS)
            .await?;
        let generated = resolve_reply(reply, catalog)?;

        info!(
            recipe_name = %recipe_name,
            ingredient_count = generated.ingredients.len(),
            matched = generated.ingredients.iter().filter(|i| i.store_product.is_some()).count(),
            "Generated recipe"
        );
        Ok(generated)
    }
}

fn build_prompt(recipe_name: &str, brief_description: &str, catalog: &[StoreProduct]) -> String {
    let products: Vec<String> = catalog
        .iter()
        .map(|p| format!("- {} | {} | {} | {}", p.id, p.name, p.category, p.price))
        .collect();

    format!(
        r###"Recipe name: {recipe_name}
Ingredients as written by the cook: {brief_description}

Store catalog (id | name | category | price):
{catalog}

Tasks:
1. Write the full recipe in Markdown with "## Ingredients" and "## Instructions" sections.
2. Parse the cook's ingredients into a list with a name and a quantity (include the unit, e.g. "200 g").
3. For each ingredient, set store_product_id to the id of the matching catalog product, or null if none fits.

Respond with JSON of exactly this shape:
{{"recipe": "markdown", "ingredients": [{{"name": "...", "quantity": "...", "store_product_id": "prod-... or null"}}]}}"###,
        catalog = products.join("\n"),
    )
}

/// Validate the model's reply and attach catalog products.
///
/// Unknown or missing product ids fall back to keyword matching on the name.
fn resolve_reply(
    reply: LlmRecipeReply,
    catalog: &[StoreProduct],
) -> Result<GeneratedRecipe, GeneratorError> {
    let full_recipe = reply.recipe.trim().to_string();
    if full_recipe.is_empty() {
        return Err(GeneratorError::EmptyResult("recipe text was empty".to_string()));
    }

    let ingredients: Vec<ExtractedIngredient> = reply
        .ingredients
        .into_iter()
        .filter(|i| !i.name.trim().is_empty())
        .enumerate()
        .map(|(index, item)| {
            let name = item.name.trim().to_string();
            let by_id = item
                .store_product_id
                .as_deref()
                .and_then(|id| catalog.iter().find(|p| p.id == id));
            let store_product = by_id.or_else(|| match_product(&name, catalog)).cloned();
            let quantity = item
                .quantity
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .unwrap_or_else(|| DEFAULT_QUANTITY.to_string());
            ExtractedIngredient {
                id: format!("ing-{index}"),
                name,
                quantity,
                store_product,
            }
        })
        .collect();

    if ingredients.is_empty() {
        return Err(GeneratorError::EmptyResult("no ingredients returned".to_string()));
    }

    Ok(GeneratedRecipe {
        full_recipe,
        ingredients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::claude_api::parse_json_reply;

    fn product(id: &str, keyword: &str) -> StoreProduct {
        StoreProduct {
            id: id.to_string(),
            name: format!("NoName {keyword}"),
            keyword: keyword.to_string(),
            price: "$1.00".to_string(),
            image_url: format!("/products/{keyword}.png"),
            category: "other".to_string(),
            in_stock: true,
        }
    }

    fn catalog() -> Vec<StoreProduct> {
        vec![
            product("prod-olive-oil", "olive oil"),
            product("prod-tomato", "tomato"),
            product("prod-egg", "egg"),
            product("prod-oil", "oil"),
        ]
    }

    #[test]
    fn split_handles_mixed_separators() {
        assert_eq!(
            split_ingredients("2 eggs, milk;\n- butter ,, "),
            vec!["2 eggs", "milk", "butter"]
        );
    }

    #[test]
    fn matching_respects_word_boundaries_and_plurals() {
        let catalog = catalog();
        assert_eq!(match_product("3 Eggs", &catalog).unwrap().id, "prod-egg");
        assert_eq!(match_product("ripe tomatoes", &catalog).unwrap().id, "prod-tomato");
        assert!(match_product("eggplant", &catalog).is_none());
        assert_eq!(
            match_product("2 tbsp olive oil", &catalog).unwrap().id,
            "prod-olive-oil"
        );
        assert!(match_product("saffron", &catalog).is_none());
    }

    #[tokio::test]
    async fn template_generator_lists_every_ingredient() {
        let generated = TemplateRecipeGenerator
            .generate("Shakshuka", "tomatoes, eggs, paprika", &catalog())
            .await
            .unwrap();

        assert!(generated.full_recipe.starts_with("# Shakshuka"));
        assert!(generated.full_recipe.contains("- paprika"));
        let names: Vec<_> = generated.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["tomatoes", "eggs", "paprika"]);
        assert_eq!(generated.ingredients[0].id, "ing-0");
        assert_eq!(generated.ingredients[0].quantity, DEFAULT_QUANTITY);
        assert!(generated.ingredients[1].store_product.is_some());
        assert!(generated.ingredients[2].store_product.is_none());
    }

    #[tokio::test]
    async fn template_generator_rejects_empty_description() {
        let err = TemplateRecipeGenerator
            .generate("Nothing", " , ;", &catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::EmptyResult(_)));
    }

    #[test]
    fn prompt_lists_catalog() {
        let prompt = build_prompt("Soup", "tomato, water", &catalog());
        assert!(prompt.contains("Recipe name: Soup"));
        assert!(prompt.contains("- prod-tomato | NoName tomato | other | $1.00"));
    }

    #[test]
    fn resolve_prefers_known_ids_then_names() {
        let reply: LlmRecipeReply = parse_json_reply(
            r###"```json
{"recipe": "## Ingredients\n- eggs", "ingredients": [
  {"name": "Eggs", "quantity": "3", "store_product_id": "prod-egg"},
  {"name": "tomato", "quantity": "", "store_product_id": "prod-unknown"},
  {"name": "  ", "quantity": "1"},
  {"name": "salt"}
]}
```"###,
        )
        .unwrap();

        let generated = resolve_reply(reply, &catalog()).unwrap();
        assert_eq!(generated.ingredients.len(), 3);
        assert_eq!(
            generated.ingredients[0].store_product.as_ref().unwrap().id,
            "prod-egg"
        );
        assert_eq!(
            generated.ingredients[1].store_product.as_ref().unwrap().id,
            "prod-tomato"
        );
        assert_eq!(generated.ingredients[1].quantity, DEFAULT_QUANTITY);
        assert_eq!(generated.ingredients[2].id, "ing-2");
        assert!(generated.ingredients[2].store_product.is_none());
    }

    #[test]
    fn resolve_rejects_blank_recipe() {
        let reply = LlmRecipeReply {
            recipe: "  ".to_string(),
            ingredients: vec![],
        };
        assert!(matches!(
            resolve_reply(reply, &catalog()),
            Err(GeneratorError::EmptyResult(_))
        ));
    }
}
