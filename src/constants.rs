use std::time::Duration;

pub const TITLE_CARD_DURATION: Duration = Duration::from_millis(3000);   // How long the title card stays up
pub const BACKGROUND_COLOR: &str = "#080808";                            // Title card background
pub const IDLE_SHUFFLE_TIMEOUT: Duration = Duration::from_millis(60_000); // Idle time before an automatic shuffle
pub const HOLD_POLL_INTERVAL: Duration = Duration::from_millis(250);      // Activity re-record rate while a button is held

pub const MAX_CONFIG_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60); // Longest duration a config option may ask for

pub const QUIT_GRACE_PERIOD: Duration = Duration::from_secs(10);          // Quit is always allowed this soon after start

pub const SERIAL_SCAN_INTERVAL: Duration = Duration::from_millis(5000);   // Time between device scans
pub const SERIAL_BAUD_RATE: u32 = 9600;                                   // Encoder firmware line rate
pub const SERIAL_ADVANCE_CODE: u8 = b'R';                                 // Byte sent on a clockwise step
pub const SERIAL_RETREAT_CODE: u8 = b'L';                                 // Byte sent on a counter-clockwise step
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(100);      // Blocking read timeout of the native reader
pub const SERIAL_CHUNK_SIZE: usize = 64;                                  // Bytes per native read

// Case-insensitive substrings identifying the encoder's USB-serial bridge
pub const KNOWN_DEVICE_PATTERNS: &[&str] = &[
    "usbmodem",
    "usbserial",
    "wchusbserial",
    "ttyacm",
    "ttyusb",
    "arduino",
    "ch340",
    "cp210",
];

pub const UNTITLED: &str = "Untitled";                                    // Placeholder project title
pub const UNKNOWN_AUTHOR: &str = "Unknown artist";                        // Placeholder project author

pub const PLAYLIST_FILE_NAME: &str = "projects.json";
pub const PLAYLIST_ENV_VAR: &str = "KIOSK_PLAYLIST";

pub const DEFAULT_BROWSER: &str = "chromium";
pub const DEFAULT_BROWSER_ARGS: &[&str] = &["--kiosk", "--noerrdialogs", "--incognito"];

pub const WINDOW_TITLE: &str = "Kiosk";
pub const FPS: u32 = 60;                                                  // Window shell frame rate

pub const INPUT_CHANNEL_CAPACITY: usize = 256;
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
