pub mod attendee;
pub mod audit_log;
pub mod booking;
pub mod event;
pub mod menu;
pub mod money;
pub mod notification;
pub mod refresh_token;
pub mod user;
pub mod venue;

pub use attendee::{AttendeeStatus, EventAttendee};
pub use audit_log::{AuditAction, AuditLog};
pub use booking::{Booking, BookingStatus};
pub use event::{Event, EventStatus};
pub use menu::Menu;
pub use notification::{Notification, NotificationType};
pub use refresh_token::RefreshToken;
pub use user::{User, UserRole};
pub use venue::Venue;
