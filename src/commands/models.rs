//! Model table commands for Parley
//!
//! This module provides commands for inspecting the model capability
//! table: listing every known model and showing the details of one.
//! Nothing here contacts the API.

use crate::completion::catalog::{ModelCatalog, ModelSpec};
use crate::config::Config;
use crate::error::{Result, ParleyError};
use prettytable::{row, Table};

/// List every model in the configured capability table
///
/// # Arguments
///
/// * `config` - Configuration holding the model table and default model
/// * `json` - Print JSON instead of a table
///
/// # Examples
///
/// ```
/// use parley::config::Config;
/// use parley::commands::models::list_models;
///
/// list_models(&Config::default(), true).unwrap();
/// ```
pub fn list_models(config: &Config, json: bool) -> Result<()> {
    let catalog = ModelCatalog::from_config(config);
    tracing::debug!(
        "Listing {} models (json: {})",
        catalog.available_models().len(),
        json
    );

    if json {
        output_models_json(catalog.available_models())?;
    } else {
        output_models_table(&catalog);
    }

    Ok(())
}

/// Show detailed information about one model
///
/// # Errors
///
/// Returns `ParleyError::UnknownModel` if the model is not in the table
pub fn show_model_info(config: &Config, model_id: &str, json: bool) -> Result<()> {
    let catalog = ModelCatalog::from_config(config);
    let spec = catalog
        .get(model_id)
        .ok_or_else(|| ParleyError::UnknownModel(model_id.to_string()))?;

    if json {
        let json = serde_json::to_string_pretty(spec).map_err(ParleyError::Serialization)?;
        println!("{}", json);
    } else {
        output_model_info_detailed(spec, catalog.default_model() == spec.id);
    }

    Ok(())
}

/// Format a dollar amount with enough precision for per-message costs
pub fn format_cost(cost: f64) -> String {
    format!("${:.6}", cost)
}

fn output_models_json(models: &[ModelSpec]) -> Result<()> {
    let json = serde_json::to_string_pretty(models).map_err(ParleyError::Serialization)?;
    println!("{}", json);
    Ok(())
}

fn output_models_table(catalog: &ModelCatalog) {
    let mut table = Table::new();
    table.add_row(row![
        "Model",
        "Name",
        "Cost / 1K tokens",
        "Max Tokens",
        "Description"
    ]);

    for model in catalog.available_models() {
        let id = if model.id == catalog.default_model() {
            format!("{} (default)", model.id)
        } else {
            model.id.clone()
        };
        table.add_row(row![
            id,
            model.name,
            format_cost(model.cost_per_1k),
            model.max_tokens,
            model.description
        ]);
    }

    println!("\nAvailable models:\n");
    table.printstd();
    println!();
}

fn output_model_info_detailed(spec: &ModelSpec, is_default: bool) {
    println!("\nModel Information ({})\n", spec.name);
    println!("Id:               {}", spec.id);
    println!("Display Name:     {}", spec.name);
    if !spec.description.is_empty() {
        println!("Description:      {}", spec.description);
    }
    println!("Cost / 1K tokens: {}", format_cost(spec.cost_per_1k));
    println!("Max Tokens:       {}", spec.max_tokens);
    println!(
        "Functions:        {}",
        if spec.supports_functions { "Yes" } else { "No" }
    );
    if is_default {
        println!("Default:          Yes");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.0015), "$0.001500");
        assert_eq!(format_cost(0.0), "$0.000000");
    }

    #[test]
    fn test_show_model_info_unknown_model() {
        let err = show_model_info(&Config::default(), "nope", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ParleyError>(),
            Some(ParleyError::UnknownModel(m)) if m == "nope"
        ));
    }

    #[test]
    fn test_show_model_info_known_model() {
        assert!(show_model_info(&Config::default(), "gpt-4", true).is_ok());
        assert!(show_model_info(&Config::default(), "gpt-4", false).is_ok());
    }

    #[test]
    fn test_list_models_both_formats() {
        let config = Config::default();
        assert!(list_models(&config, false).is_ok());
        assert!(list_models(&config, true).is_ok());
    }
}
