// Form validation rules applied before any request leaves the device

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{BookingCore, CreateBookingRequest, CreatePaymentRequest, RegisterData};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PHONE_LEN: usize = 10;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::new("email", "Email is required"));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ValidationError::new("email", "Please enter a valid email"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::new("password", "Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("name", "Name is required"));
    }
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(ValidationError::new(
            "name",
            format!("Name must be at least {} characters", MIN_NAME_LEN),
        ));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().is_empty() {
        return Err(ValidationError::new("phone", "Phone number is required"));
    }
    if phone.trim().chars().count() < MIN_PHONE_LEN {
        return Err(ValidationError::new(
            "phone",
            format!("Phone number must be at least {} digits", MIN_PHONE_LEN),
        ));
    }
    Ok(())
}

// Every failing field is reported, not just the first
pub fn validate_login(email: &str, password: &str) -> Result<(), Vec<ValidationError>> {
    collect(vec![validate_email(email), validate_password(password)])
}

pub fn validate_registration(data: &RegisterData) -> Result<(), Vec<ValidationError>> {
    collect(vec![
        validate_name(&data.name),
        validate_email(&data.email),
        validate_password(&data.password),
        validate_phone(&data.phone),
    ])
}

fn collect(results: Vec<Result<(), ValidationError>>) -> Result<(), Vec<ValidationError>> {
    let errors: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_seat_request(requested: u32, available: u32) -> Result<(), ValidationError> {
    if requested == 0 {
        return Err(ValidationError::new(
            "number_of_seats",
            "Please enter a valid number of seats.",
        ));
    }
    if requested > available {
        return Err(ValidationError::new(
            "number_of_seats",
            format!("Only {} seats available.", available),
        ));
    }
    Ok(())
}

impl CreateBookingRequest {
    /// Builds a booking for `seats` seats on a schedule with `available_seats` left.
    pub fn for_schedule(
        schedule_id: &str,
        available_seats: u32,
        seats: u32,
        notes: Option<&str>,
    ) -> Result<Self, ValidationError> {
        if schedule_id.is_empty() {
            return Err(ValidationError::new("schedule_id", "Schedule is missing."));
        }
        validate_seat_request(seats, available_seats)?;
        Ok(Self {
            schedule_id: schedule_id.to_string(),
            number_of_seats: seats,
            notes: notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
        })
    }
}

impl CreatePaymentRequest {
    // The amount is always the booking's total price
    pub fn for_booking(
        booking: &BookingCore,
        payment_method_id: Option<&str>,
        payment_proof: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let payment_method_id = payment_method_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            ValidationError::new("payment_method_id", "Please select a payment method.")
        })?;
        let payment_proof = payment_proof.filter(|p| !p.is_empty()).ok_or_else(|| {
            ValidationError::new("payment_proof", "Please upload proof of payment.")
        })?;
        Ok(Self {
            booking_id: booking.id.clone(),
            payment_method_id: payment_method_id.to_string(),
            amount: booking.total_price,
            payment_proof: payment_proof.to_string(),
        })
    }
}
