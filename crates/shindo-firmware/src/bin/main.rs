#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::fmt::Write as _;

use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_time::Timer;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_8X13;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::ledc::channel::ChannelIFace;
use esp_hal::ledc::timer::TimerIFace;
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed, channel, timer};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::{MwdtStage, TimerGroup};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiDevice};
use log::{error, info, warn};
use rtt_target::rprintln;
use static_cell::StaticCell;

// Display-LCD panel specific imports
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::spi::master::{Config, Spi};
use mipidsi::interface::SpiInterface;
use mipidsi::{Builder as MipidsiBuilder, models::ILI9341Rgb565};

use shindo_core::config::{Config as WatchSettings, InternetConfig};
use shindo_core::decode::gif::GifDecoder;
use shindo_core::feed::Clock;
use shindo_core::surface::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX};
use shindo_core::watcher::{Button, Watcher};
use shindo_firmware::clock::{NTP_SERVER, SntpClock, sntp_query};
use shindo_firmware::net::StackConnect;
use shindo_firmware::panel::LcdPanel;
use shindo_firmware::secrets;

/// Main loop pace: button sampling and tick scheduling.
const LOOP_PERIOD_MS: u64 = 200;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// One line of white-on-blue boot status text.
fn boot_line<D: DrawTarget<Color = Rgb565>>(display: &mut D, line: i32, text: &str) {
    let style = MonoTextStyle::new(&FONT_8X13, Rgb565::WHITE);
    let _ = embedded_graphics::text::Text::new(text, Point::new(8, 20 + line * 16), style)
        .draw(display);
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_print!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // The watcher owns roughly 250 kB of fixed pipeline allocations
    // (framebuffer, background surface, resource buffer), all made once
    // at boot; the heap has to cover them plus the radio.
    esp_alloc::heap_allocator!(size: 288 * 1024);
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    rprintln!("Embassy initialized!");

    // The network runner task needs 'static interfaces, so the radio
    // controller lives in a StaticCell rather than on this stack frame.
    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio_init = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi controller"));
    let (mut wifi_controller, interfaces) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi interface");

    // Configure and initialize the display

    // 1. Configure SPI bus
    let spi_bus = Spi::new(peripherals.SPI2, Config::default())
        .unwrap()
        .with_sck(peripherals.GPIO36)
        .with_mosi(peripherals.GPIO37);

    // 2. Chip-select and DC pins
    let cs = Output::new(peripherals.GPIO35, Level::High, OutputConfig::default());
    let dc = Output::new(peripherals.GPIO34, Level::Low, OutputConfig::default());

    let spi_device = ExclusiveDevice::new_no_delay(spi_bus, cs).unwrap();

    // 3. Buffer for SPI batching (larger = faster, uses more RAM)
    let mut spi_buffer = [0u8; 512];
    let di = SpiInterface::new(spi_device, dc, &mut spi_buffer);

    let mut display = MipidsiBuilder::new(ILI9341Rgb565, di)
        .display_size(DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX)
        .init(&mut embassy_time::Delay)
        .expect("Failed to initialize display");

    // Backlight PWM so the watcher can dim the panel.
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let mut backlight_timer = ledc.timer::<LowSpeed>(timer::Number::Timer0);
    backlight_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty8Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_khz(1),
        })
        .expect("Failed to configure backlight timer");
    let mut backlight = ledc.channel(channel::Number::Channel0, peripherals.GPIO38);
    backlight
        .configure(channel::config::Config {
            timer: &backlight_timer,
            duty_pct: 100,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .expect("Failed to configure backlight channel");

    let settings = WatchSettings {
        internet: InternetConfig {
            ssid: secrets::WIFI_SSID,
            password: secrets::WIFI_PASSWORD,
        },
        ..Default::default()
    };

    let _ = display.clear(Rgb565::BLUE);
    boot_line(&mut display, 0, "[KYOSHIN]");

    // Join Wi-Fi. There is nothing useful to do without it, so retry
    // until association succeeds.
    let mut line: heapless::String<64> = heapless::String::new();
    let _ = write!(line, "WiFi: {}", settings.internet.ssid);
    boot_line(&mut display, 1, line.as_str());

    let client_config = ClientConfig::default()
        .with_ssid(settings.internet.ssid.into())
        .with_password(settings.internet.password.into());
    wifi_controller
        .set_config(&ModeConfig::Client(client_config))
        .expect("Failed to set Wi-Fi credentials");
    wifi_controller
        .start_async()
        .await
        .expect("Failed to start Wi-Fi");
    while let Err(err) = wifi_controller.connect_async().await {
        warn!("Wi-Fi association failed: {:?}", err);
        Timer::after_secs(1).await;
    }
    info!("Wi-Fi associated");

    // DHCP over the station interface.
    let mut rng = Rng::new(peripherals.RNG);
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    static RESOURCES: StaticCell<StackResources<6>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(net_task(runner)).expect("net task");

    stack.wait_config_up().await;
    let v4 = stack.config_v4().expect("DHCP configuration");
    line.clear();
    let _ = write!(line, "IP: {}", v4.address.address());
    boot_line(&mut display, 2, line.as_str());
    info!("{}", line);

    // Seed the wall clock. The feed is named after JST seconds, so no
    // cycle can run before this succeeds.
    line.clear();
    let _ = write!(line, "NTP: {}", NTP_SERVER);
    boot_line(&mut display, 3, line.as_str());
    let base = loop {
        if let Some(unix) = sntp_query(stack).await {
            break unix;
        }
        Timer::after_secs(1).await;
    };
    let mut clock = SntpClock::new(base);
    let now = clock.now();
    line.clear();
    let _ = write!(
        line,
        "Time: {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        now.year, now.month, now.day, now.hour, now.minute, now.second
    );
    boot_line(&mut display, 4, line.as_str());
    info!("{}", line);

    let panel = LcdPanel::new(backlight, Output::new(
        peripherals.GPIO42,
        Level::Low,
        OutputConfig::default(),
    ));
    let mut watcher = Watcher::new(
        StackConnect::new(stack),
        GifDecoder::new(),
        panel,
        settings.feed.host,
        settings.watch,
    );

    boot_line(&mut display, 5, "Getting map...");
    if let Err(err) = watcher.load_base_map().await {
        error!("base map load failed: {}", err);
        boot_line(&mut display, 6, "MAP LOAD FAILED");
        // Nothing to show without a map. Halt here; power-cycling retries.
        loop {
            Timer::after_secs(1).await;
        }
    }

    let _ = display.clear(Rgb565::BLACK);
    watcher.power_on();

    // Buttons are active low.
    let input_config = InputConfig::default().with_pull(Pull::Up);
    let wake_button = Input::new(peripherals.GPIO4, input_config);
    let mute_button = Input::new(peripherals.GPIO5, input_config);
    let sleep_button = Input::new(peripherals.GPIO6, input_config);
    let mut was_pressed = [false; 3];

    // Watchdog armed only once the steady-state loop is reached, so a
    // hung fetch reboots us rather than freezing the monitor.
    let timg1 = TimerGroup::new(peripherals.TIMG1);
    let mut wdt = timg1.wdt;
    wdt.set_timeout(MwdtStage::Stage0, esp_hal::time::Duration::from_secs(10));
    wdt.enable();

    info!("entering watch loop");
    loop {
        wdt.feed();

        let buttons = [
            (wake_button.is_low(), Button::Wake),
            (mute_button.is_low(), Button::MuteToggle),
            (sleep_button.is_low(), Button::Sleep),
        ];
        for (i, (pressed, button)) in buttons.into_iter().enumerate() {
            if pressed && !was_pressed[i] {
                info!("button: {:?}", button);
                watcher.handle_button(button);
            }
            was_pressed[i] = pressed;
        }

        watcher.tick(clock.now()).await;
        if let Err(err) = watcher.flush(&mut display) {
            warn!("display flush failed: {:?}", err);
        }

        Timer::after_millis(LOOP_PERIOD_MS).await;
    }
}
