//! Ledger profile commands: tutor, student, invalidate.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

pub async fn cmd_tutor(port: u16, address: &str) -> Result<()> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TutorResponse {
        address: String,
        name: String,
        /// Minor units per second, rendered as a decimal string.
        rate_per_second: String,
        #[serde(default)]
        language_ids: Vec<u32>,
        is_registered: bool,
        source: String,
    }

    let resp: TutorResponse = get_json(&format!("{}/tutors/{}", base_url(port), address)).await?;

    let languages = resp
        .language_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    println!("═══════════════════════════════════════");
    println!("  Tutor Profile");
    println!("═══════════════════════════════════════");
    println!("  Address    : {}", resp.address);
    println!("  Name       : {}", resp.name);
    println!("  Rate       : {}/s", resp.rate_per_second);
    println!("  Languages  : {}", languages);
    println!(
        "  Registered : {}",
        if resp.is_registered { "yes" } else { "no" }
    );
    println!("  Source     : {}", resp.source);

    Ok(())
}

pub async fn cmd_student(port: u16, address: &str) -> Result<()> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct StudentResponse {
        address: String,
        name: String,
        is_registered: bool,
        source: String,
    }

    let resp: StudentResponse =
        get_json(&format!("{}/students/{}", base_url(port), address)).await?;

    println!("═══════════════════════════════════════");
    println!("  Student Profile");
    println!("═══════════════════════════════════════");
    println!("  Address    : {}", resp.address);
    println!("  Name       : {}", resp.name);
    println!(
        "  Registered : {}",
        if resp.is_registered { "yes" } else { "no" }
    );
    println!("  Source     : {}", resp.source);

    Ok(())
}

pub async fn cmd_invalidate(port: u16, address: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct InvalidateResponse {
        address: String,
        invalidated: bool,
    }

    let resp: InvalidateResponse = post_json(&format!(
        "{}/registrations/{}/invalidate",
        base_url(port),
        address
    ))
    .await?;

    if resp.invalidated {
        println!("✓ Cached profile dropped for {}", resp.address);
    } else {
        println!("No cached profile for {}", resp.address);
    }

    Ok(())
}
