//! Form checks run before anything is written to the backend.

use uuid::Uuid;

use crate::{
    error::ValidationError,
    models::{
        InquiryForm, ItineraryDay, LoginForm, NewInquiry, NewReview, ProfileUpdate, RegisterForm,
        ReviewForm, SessionUser, TrekInput, TrekUpdate, UpdatePasswordForm,
    },
};

pub const MIN_PASSWORD_LEN: usize = 6;
const ANONYMOUS: &str = "Anonymous";

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the domain
/// with text on both sides.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // Some dot with text on both sides of it.
    domain
        .match_indices('.')
        .any(|(i, _)| i > 0 && i + 1 < domain.len())
}

/// 7 to 15 characters drawn from digits, `+`, `-` and whitespace.
pub fn is_valid_phone(value: &str) -> bool {
    let len = value.chars().count();
    (7..=15).contains(&len)
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c.is_whitespace())
}

/// validate_inquiry
///
/// Checks every field of the contact form and, when all pass, produces the
/// trimmed row to insert. A blank phone is stored as absent.
pub fn validate_inquiry(
    trek_id: Uuid,
    user_id: Option<Uuid>,
    form: &InquiryForm,
) -> Result<NewInquiry, ValidationError> {
    let name = form.name.trim();
    let email = form.email.trim();
    let phone = form.phone.trim();
    let message = form.message.trim();

    let mut errors = ValidationError::default();
    if name.is_empty() {
        errors.push("name", "Full name is required");
    }
    if email.is_empty() {
        errors.push("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.push("email", "Invalid email format");
    }
    if !phone.is_empty() && !is_valid_phone(phone) {
        errors.push("phone", "Invalid phone number");
    }
    if message.is_empty() {
        errors.push("message", "Message is required");
    }
    errors.into_result()?;

    Ok(NewInquiry {
        trek_id,
        user_id,
        name: name.to_string(),
        email: email.to_string(),
        phone: (!phone.is_empty()).then(|| phone.to_string()),
        message: message.to_string(),
    })
}

/// validate_review
///
/// A star rating is mandatory. The reviewer's display name comes from their
/// auth metadata.
pub fn validate_review(
    trek_id: Uuid,
    user: &SessionUser,
    form: &ReviewForm,
) -> Result<NewReview, ValidationError> {
    let rating = match form.rating {
        None | Some(0) => return Err(ValidationError::single("rating", "Please give a star rating")),
        Some(r) if !(1..=5).contains(&r) => {
            return Err(ValidationError::single("rating", "Rating must be between 1 and 5"));
        }
        Some(r) => r as i16,
    };

    let full_name = user
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string();

    Ok(NewReview {
        trek_id,
        user_id: user.id,
        full_name,
        rating,
        comment: form.comment.trim().to_string(),
    })
}

pub fn validate_login(form: &LoginForm) -> Result<(), ValidationError> {
    if form.email.trim().is_empty() || form.password.is_empty() {
        return Err(ValidationError::single(
            "email",
            "Please enter both email and password.",
        ));
    }
    Ok(())
}

fn check_new_password(errors: &mut ValidationError, password: &str, confirm: &str) {
    if password.len() < MIN_PASSWORD_LEN {
        errors.push("password", "Password must be at least 6 characters");
    }
    if password != confirm {
        errors.push("confirm_password", "Passwords do not match");
    }
}

pub fn validate_registration(form: &RegisterForm) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    let email = form.email.trim();
    if email.is_empty() {
        errors.push("email", "Email is required");
    } else if !is_valid_email(email) {
        errors.push("email", "Invalid email format");
    }
    check_new_password(&mut errors, &form.password, &form.confirm_password);
    errors.into_result()
}

/// Password fields only; the recovery tokens are checked by the caller because a
/// missing token is an auth failure, not a form error.
pub fn validate_new_password(form: &UpdatePasswordForm) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    check_new_password(&mut errors, &form.password, &form.confirm_password);
    errors.into_result()
}

pub fn validate_email_only(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::single("email", "Email is required"));
    }
    if !is_valid_email(email) {
        return Err(ValidationError::single("email", "Invalid email format"));
    }
    Ok(())
}

pub fn validate_profile_update(update: &ProfileUpdate) -> Result<(), ValidationError> {
    match update.phone.as_deref().map(str::trim) {
        Some(phone) if !phone.is_empty() && !is_valid_phone(phone) => {
            Err(ValidationError::single("phone", "Invalid phone number"))
        }
        _ => Ok(()),
    }
}

/// Days start at 1 and strictly increase.
fn check_itinerary(errors: &mut ValidationError, itinerary: &[ItineraryDay]) {
    let mut previous = 0;
    for day in itinerary {
        if day.day <= previous {
            errors.push("itinerary", "Itinerary days must start at 1 and increase");
            return;
        }
        previous = day.day;
    }
}

pub fn validate_trek(input: &TrekInput) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if input.title.trim().is_empty() {
        errors.push("title", "Title is required");
    }
    if input.region.trim().is_empty() {
        errors.push("region", "Region is required");
    }
    if input.difficulty.trim().is_empty() {
        errors.push("difficulty", "Difficulty is required");
    }
    if input.season.trim().is_empty() {
        errors.push("season", "Season is required");
    }
    if input.duration_days <= 0 {
        errors.push("duration_days", "Duration must be at least one day");
    }
    check_itinerary(&mut errors, &input.itinerary);
    errors.into_result()
}

pub fn validate_trek_update(update: &TrekUpdate) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());
    if blank(&update.title) {
        errors.push("title", "Title is required");
    }
    if blank(&update.region) {
        errors.push("region", "Region is required");
    }
    if blank(&update.difficulty) {
        errors.push("difficulty", "Difficulty is required");
    }
    if blank(&update.season) {
        errors.push("season", "Season is required");
    }
    if update.duration_days.is_some_and(|d| d <= 0) {
        errors.push("duration_days", "Duration must be at least one day");
    }
    if let Some(itinerary) = &update.itinerary {
        check_itinerary(&mut errors, itinerary);
    }
    errors.into_result()
}

pub fn validate_inquiry_status(status: &str) -> Result<String, ValidationError> {
    let status = status.trim();
    if status.is_empty() {
        return Err(ValidationError::single("status", "Status is required"));
    }
    Ok(status.to_lowercase())
}
