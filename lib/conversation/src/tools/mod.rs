//! Built-in tool handlers.

pub mod digest;
pub mod image;
pub mod price;
pub mod reminder;
pub mod weather;

pub use digest::{MORNING_MESSAGE_JOB, MORNING_MESSAGE_TOOL, MorningMessageTool};
pub use image::{IMAGE_TOOL, ImageTool};
pub use price::{PRICE_TOOL, PriceTool};
pub use reminder::{PENDING_REMINDER_JOB, REMINDER_JOB, REMINDER_TOOL, ReminderArgs, ReminderTool};
pub use weather::{WEATHER_TOOL, WeatherTool};
