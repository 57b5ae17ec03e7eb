//! `modelhub inspect`: summarize a GLB file.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use modelhub_converter::inspect::{self, GlbReport};
use modelhub_core::error::AppError;

/// Arguments for the inspect command
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// GLB file to inspect
    pub file: PathBuf,
}

/// Material display row
#[derive(Debug, Serialize, Tabled)]
struct MaterialRow {
    /// Material index
    index: String,
    /// Name
    name: String,
    /// Base color factor
    base_color: String,
    /// Metallic factor
    metallic: String,
    /// Roughness factor
    roughness: String,
    /// Base color texture
    texture: String,
}

/// Execute the inspect command
pub async fn execute(args: &InspectArgs, format: OutputFormat) -> Result<(), AppError> {
    let report = inspect::inspect(&args.file).await?;

    match format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Table => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &GlbReport) {
    println!("GLB: {}", report.path.display());
    output::print_kv("Size", &output::format_bytes(report.file_bytes));
    output::print_kv("Generator", report.generator.as_deref().unwrap_or("-"));
    output::print_kv("Meshes", &report.meshes.len().to_string());
    output::print_kv("Textures", &report.texture_count.to_string());
    output::print_kv("Images", &report.image_count.to_string());
    match &report.dimensions {
        Some(d) => output::print_kv(
            "Dimensions (cm)",
            &format!("{} x {} x {}", d.width_cm, d.height_cm, d.depth_cm),
        ),
        None => output::print_kv("Dimensions (cm)", "-"),
    }

    let unassigned: usize = report
        .meshes
        .iter()
        .map(|m| m.primitive_materials.iter().filter(|p| p.is_none()).count())
        .sum();
    if unassigned > 0 {
        output::print_warning(&format!("{} primitive(s) have no material", unassigned));
    }

    let rows: Vec<MaterialRow> = report
        .materials
        .iter()
        .map(|m| MaterialRow {
            index: m.index.map_or_else(|| "default".to_string(), |i| i.to_string()),
            name: m.name.clone().unwrap_or_default(),
            base_color: format!(
                "{:.3}, {:.3}, {:.3}, {:.3}",
                m.base_color_factor[0],
                m.base_color_factor[1],
                m.base_color_factor[2],
                m.base_color_factor[3]
            ),
            metallic: format!("{:.2}", m.metallic_factor),
            roughness: format!("{:.2}", m.roughness_factor),
            texture: m
                .base_color_texture
                .map_or_else(|| "-".to_string(), |t| t.to_string()),
        })
        .collect();

    println!();
    output::print_list(&rows, OutputFormat::Table);
}
