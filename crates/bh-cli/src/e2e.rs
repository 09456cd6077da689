use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use thirtyfour::extensions::cdp::ChromeDevTools;
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;

pub struct E2eOptions {
    pub chromedriver_url: String,
    pub extension_path: String,
    pub extension_id: Option<String>,
    pub pr_url: String,
    pub headless: bool,
}

pub fn run_e2e(opts: E2eOptions) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(run_e2e_async(opts))
}

async fn run_e2e_async(opts: E2eOptions) -> Result<(), String> {
    let extension_path = canonicalize_path(&opts.extension_path)?;

    let mut caps = ChromeCapabilities::new();
    let mut args = vec![
        format!("--disable-extensions-except={}", extension_path.display()),
        format!("--load-extension={}", extension_path.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
    ];
    if opts.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    for arg in &args {
        caps.add_arg(arg)
            .map_err(|e| format!("Failed to set chrome arg: {}", e))?;
    }

    let driver = WebDriver::new(&opts.chromedriver_url, caps)
        .await
        .map_err(|e| format!("Failed to connect to chromedriver: {}", e))?;

    let cdp = ChromeDevTools::new(driver.handle.clone());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut errors = Vec::new();

    if let Err(e) = check_pull_request_page(&driver, &opts.pr_url).await {
        errors.push(format!("Pull request page check failed: {}", e));
    }

    let extension_id = match opts.extension_id {
        Some(id) => Some(id),
        None => find_extension_id(&cdp).await,
    };
    match extension_id {
        Some(id) => {
            if let Err(e) = check_popup(&driver, &id).await {
                errors.push(format!("Popup check failed: {}", e));
            }
        }
        None => println!("Skipping popup check: extension id not found (pass --extension-id)"),
    }

    driver.quit().await.ok();

    if errors.is_empty() {
        println!("✓ E2E checks passed");
        Ok(())
    } else {
        Err(format!("E2E failed:\n- {}", errors.join("\n- ")))
    }
}

async fn find_extension_id(cdp: &ChromeDevTools) -> Option<String> {
    let targets = cdp.execute_cdp("Target.getTargets").await.ok()?;
    let infos = targets.get("targetInfos")?.as_array()?;
    for info in infos {
        let target_type = info.get("type").and_then(Value::as_str).unwrap_or("");
        let url = info.get("url").and_then(Value::as_str).unwrap_or("");
        let is_background = matches!(target_type, "background_page" | "service_worker");
        if is_background && url.starts_with("chrome-extension://") {
            let id = url.trim_start_matches("chrome-extension://");
            if let Some(id) = id.split('/').next() {
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
        }
    }
    None
}

/// The toggle appears, bots are marked, and a click reveals them.
async fn check_pull_request_page(driver: &WebDriver, url: &str) -> Result<(), String> {
    driver.goto(url).await.map_err(|e| format!("Failed to open '{}': {}", url, e))?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let button = driver
        .find(By::Css(".bot-hider-toggle"))
        .await
        .map_err(|e| format!("Toggle button missing: {}", e))?;

    let hidden = eval_count(driver, "return document.querySelectorAll('.bot-comment-hidden').length;")
        .await
        .map_err(|e| format!("Failed to count hidden comments: {}", e))?;
    if hidden == 0 {
        return Err("Expected at least one hidden bot comment".to_string());
    }

    button.click().await.map_err(|e| format!("Failed to click toggle: {}", e))?;
    let after = eval_count(driver, "return document.querySelectorAll('.bot-comment-hidden').length;")
        .await
        .map_err(|e| format!("Failed to count hidden comments: {}", e))?;
    if after != 0 {
        return Err(format!("Expected all comments visible after toggle, {} still hidden", after));
    }

    // leave the stored flag as we found it
    button.click().await.map_err(|e| format!("Failed to click toggle: {}", e))?;
    Ok(())
}

async fn check_popup(driver: &WebDriver, extension_id: &str) -> WebDriverResult<()> {
    driver.goto(&format!("chrome-extension://{}/popup.html", extension_id)).await?;
    driver.find(By::Css("#toggle-enabled")).await?;
    driver.find(By::Css("#hidden-count")).await?;
    Ok(())
}

async fn eval_count(driver: &WebDriver, script: &str) -> WebDriverResult<u64> {
    let result = driver.execute(script, Vec::<Value>::new()).await?;
    Ok(result.json().as_u64().unwrap_or(0))
}

fn canonicalize_path(path: &str) -> Result<PathBuf, String> {
    std::fs::canonicalize(path)
        .map_err(|e| format!("Failed to resolve '{}': {}", path, e))
}
