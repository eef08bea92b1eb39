//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - serve: HTTP server plus background reconciliation
//! - sync: one triggered pass from the command line
//! - courses: list provider courses
//! - doctor: validate configuration and check dependencies

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::api;
use crate::classroom::CourseProvider;
use crate::config::Config;
use crate::context::AppContext;
use crate::db::Database;
use crate::sync::scheduler;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Start the HTTP server and, when enabled, the background sync loop
///
/// Runs until ctrl-c, then stops the scheduler, finishes in-flight
/// requests, and checkpoints the store.
pub async fn handle_serve(config: Config) -> Result<()> {
    let bind_addr = config.core.bind_addr.clone();
    let ctx = AppContext::from_config(config).await?;

    let scheduler_handle = if ctx.config.sync.enabled {
        Some(scheduler::spawn(
            Arc::clone(&ctx.reconciler),
            ctx.config.classroom.tracked_courses.clone(),
            Duration::from_secs(ctx.config.sync.interval_secs),
        ))
    } else {
        tracing::info!("Background sync disabled by configuration");
        None
    };

    let app = api::router(ctx.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("HTTP server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    if let Some(handle) = scheduler_handle {
        handle.shutdown().await;
    }
    ctx.flush().await?;

    Ok(())
}

/// Run one triggered sync pass over every tracked course
pub async fn handle_sync(config: Config, format: OutputFormat) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let tracked = ctx.config.classroom.tracked_courses.clone();

    if tracked.is_empty() {
        match format {
            OutputFormat::Text => println!("No hay cursos configurados en classroom.tracked_courses."),
            OutputFormat::Json => println!("{}", json!({"error": "no tracked courses"})),
        }
        return Ok(());
    }

    let report = ctx
        .reconciler
        .sync_all(&tracked)
        .await
        .context("Sync pass failed")?;

    match format {
        OutputFormat::Text => {
            println!(
                "✅ Se sincronizaron {} tareas de {} curso(s).",
                report.total_upserted(),
                tracked.len()
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    ctx.flush().await?;
    Ok(())
}

/// List the provider courses visible to the configured identity
pub async fn handle_courses(config: Config, format: OutputFormat) -> Result<()> {
    let provider = crate::context::build_provider(&config);

    let courses = provider
        .list_courses()
        .await
        .context("Failed to list courses")?;

    match format {
        OutputFormat::Text => {
            if courses.is_empty() {
                println!("⚠️ No se encontraron clases para esta cuenta.");
            } else {
                println!("✅ Clases disponibles:");
                for course in &courses {
                    println!("{} → {}", course.name, course.id);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&courses)?);
        }
    }

    Ok(())
}

/// Run system diagnostics
///
/// Validates the configuration, opens the database, and checks provider
/// reachability, reporting any issues found.
pub async fn handle_doctor(config: Config, format: OutputFormat) -> Result<()> {
    let mut issues: Vec<String> = Vec::new();
    let mut checks: Vec<(&str, String)> = Vec::new();

    // Configuration is validated at load time
    checks.push(("Configuration", "Valid".to_string()));

    // Data directory
    let data_dir = config.data_dir()?;
    if data_dir.exists() {
        checks.push(("Data directory", "Exists".to_string()));
    } else {
        checks.push(("Data directory", "Missing (created on first run)".to_string()));
    }

    // Database
    match Database::new(&config.db_path()?).await {
        Ok(db) => {
            let count = db.tasks().count().await.unwrap_or(0);
            checks.push(("Database", format!("OK ({} tasks mirrored)", count)));
            db.close().await.ok();
        }
        Err(e) => {
            checks.push(("Database", "Failed".to_string()));
            issues.push(format!("Cannot open database: {}", e));
        }
    }

    // Tracked courses
    let tracked = config.classroom.tracked_courses.len();
    if tracked == 0 {
        checks.push(("Tracked courses", "None configured".to_string()));
        if config.sync.enabled {
            issues.push(
                "Background sync is enabled but classroom.tracked_courses is empty".to_string(),
            );
        }
    } else {
        checks.push(("Tracked courses", tracked.to_string()));
    }

    // Course provider
    let provider = crate::context::build_provider(&config);
    match provider.list_courses().await {
        Ok(courses) => {
            checks.push(("Course provider", format!("Reachable ({} courses)", courses.len())));
        }
        Err(e) => {
            checks.push(("Course provider", "Unreachable".to_string()));
            issues.push(format!("Cannot reach the course provider: {}", e));
        }
    }

    // Intent service binding
    if config.intent.project_id.is_empty() {
        checks.push(("Intent service", "Not configured".to_string()));
        issues.push("intent.project_id is empty; /chat will only answer the task list".to_string());
    } else {
        checks.push(("Intent service", "Configured".to_string()));
    }

    match format {
        OutputFormat::Text => {
            println!("Aula System Diagnostics");
            println!("=======================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<18} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({"name": name, "status": status})
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
