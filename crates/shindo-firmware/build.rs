fn main() {
    println!("cargo:rerun-if-changed=.env");

    // Wi-Fi credentials come from a local .env file (or the environment)
    // and are baked into the binary at build time.
    let _ = dotenvy::dotenv();
    for key in ["WIFI_SSID", "WIFI_PASSWORD"] {
        let value = std::env::var(key).unwrap_or_default();
        println!("cargo:rustc-env={key}={value}");
    }
}
