use hailin_cloud::{HailinClient, LoginType};
use std::env;

#[tokio::main]
async fn main() -> hailin_cloud::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let username = args.get(1).expect("usage: poll <username> <password> [--mobile]");
    let password = args.get(2).expect("usage: poll <username> <password> [--mobile]");
    let login_type = if args.iter().any(|a| a == "--mobile") {
        LoginType::Mobile
    } else {
        LoginType::Email
    };

    let mut client = HailinClient::builder(login_type, username, password).build();

    println!("Logging in as {username}...");
    client.login().await?;
    println!("Logged in. Polling for updates...");

    loop {
        match client.refresh().await {
            Ok(count) => {
                println!("{count} device(s):");
                for device in client.devices() {
                    println!(
                        "[{}/{}] {} | mode: {:?} | fan: {:?} | {:?} -> {:?}{}",
                        device.house_name,
                        device.group_name,
                        device.name,
                        device.hvac_mode,
                        device.fan_mode,
                        device.current_temperature,
                        device.target_temperature,
                        if device.available { "" } else { " | OFFLINE" },
                    );
                }
            }
            Err(e) => eprintln!("Refresh error: {e}"),
        }
        tokio::time::sleep(client.poll_interval()).await;
    }
}
