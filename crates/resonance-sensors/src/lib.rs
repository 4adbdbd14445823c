pub mod alert_dispatch_sensor;
pub mod audio_file_sensor;
pub mod cleanup_sensor;
pub mod health_sensor;
pub mod url_sensor;

pub use alert_dispatch_sensor::AlertDispatchSensor;
pub use audio_file_sensor::AudioFileSensor;
pub use cleanup_sensor::CleanupSensor;
pub use health_sensor::HealthSensor;
pub use url_sensor::UrlSensor;
