use std::env;
use std::error::Error;

use ipqs_rs::{BulkListType, BulkOutcome, IpqsClient, RequestOptions, VERSION};

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[tokio::test]
#[ignore = "Requires network access and IPQS_API_KEY"]
async fn live_endpoints() -> Result<(), Box<dyn Error>> {
    println!("ipqs-rs {} live smoke test", VERSION);

    let client = IpqsClient::from_env()?;

    let ip = env_or("IPQS_TEST_IP", "8.8.8.8");
    let ip_result = client
        .check_ip(&ip, Some("Mozilla/5.0"), Some("en-US"), Some(1))
        .await?;
    println!("IP {} -> proxy: {:?}, vpn: {:?}", ip, ip_result.get("proxy"), ip_result.get("vpn"));

    let email = env_or("IPQS_TEST_EMAIL", "test@ipqualityscore.com");
    let email_result = client
        .verify_email(&email, &RequestOptions::new().with("timeout", 5))
        .await?;
    println!("Email {} -> valid: {:?}", email, email_result.get("valid"));

    let phone = env_or("IPQS_TEST_PHONE", "+15551234567");
    let phone_result = client
        .validate_phone(&phone, &RequestOptions::new().with("country_code", "US"))
        .await?;
    println!("Phone {} -> valid: {:?}", phone, phone_result.get("valid"));

    if env::var("IPQS_TEST_BULK").is_ok() {
        match client
            .bulk_validate_csv(BulkListType::Email, [email.as_str(), "invalid-email-address"])
            .await?
        {
            BulkOutcome::Finished(results) => println!("Bulk results: {results}"),
            BulkOutcome::Pending(status) => println!("Bulk job still {:?}", status.status()),
        }
    }

    Ok(())
}
