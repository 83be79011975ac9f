// Client-side session and API layer for the travel booking app

pub mod api_client;
pub mod models;
pub mod session_store;
pub mod storage;
pub mod validation;

// Re-export key types for convenience
pub use api_client::{ApiError, ClientConfig, ClientError, HttpApiClient, TravelApi};
pub use models::{
    BookingCore, BookingDetail, CreateBookingRequest, CreatePaymentRequest, ListEnvelope,
    ListQuery, PackageWithDestinations, PaymentDetail, PaymentMethod, RegisterData,
    ScheduleDetail, User, UserPatch, UserRole,
};
pub use session_store::{AuthOutcome, Navigator, SessionState, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
pub use validation::ValidationError;
