use crate::errors::AppError;
use crate::models::{Booking, BookingAction, BookingStatus, Role};

/// Terminal status a cancellation lands in, by who asked for it.
pub fn cancel_target(role: Role) -> BookingStatus {
    match role {
        Role::Client => BookingStatus::CanceledByGuest,
        Role::Host => BookingStatus::CanceledByHost,
    }
}

/// Status a successful action moves the booking to.
pub fn target_status(action: BookingAction, role: Role) -> BookingStatus {
    match action {
        BookingAction::RequestToBook => BookingStatus::PendingApproval,
        BookingAction::InstantBook => BookingStatus::PendingPayment,
        BookingAction::Approve => BookingStatus::PendingPayment,
        BookingAction::ConfirmPayment => BookingStatus::Confirmed,
        BookingAction::CheckIn => BookingStatus::Active,
        BookingAction::CheckOut => BookingStatus::Completed,
        BookingAction::Cancel => cancel_target(role),
    }
}

/// Decides whether `actor_id` may perform `action` on `booking` right now.
/// Non-participants are always rejected. Participants with the wrong role
/// get an authorization error; the right role in the wrong status gets an
/// invalid-transition error naming the edge that was attempted.
pub fn can_perform(
    actor_id: &str,
    booking: &Booking,
    action: BookingAction,
) -> Result<Role, AppError> {
    let role = booking
        .role_of(actor_id)
        .ok_or_else(|| AppError::Unauthorized("not a participant in this booking".into()))?;

    let (required_role, required_status) = match action {
        BookingAction::RequestToBook => (Role::Client, BookingStatus::Inquiry),
        BookingAction::InstantBook => (Role::Client, BookingStatus::Inquiry),
        BookingAction::Approve => (Role::Host, BookingStatus::PendingApproval),
        BookingAction::ConfirmPayment => (Role::Client, BookingStatus::PendingPayment),
        BookingAction::CheckIn => (Role::Host, BookingStatus::Confirmed),
        BookingAction::CheckOut => (Role::Host, BookingStatus::Active),
        BookingAction::Cancel => {
            // Either side may cancel, but only along an edge the transition
            // table actually has for their side.
            let target = cancel_target(role);
            if !booking.status.can_transition_to(target) {
                return Err(AppError::InvalidTransition {
                    from: booking.status,
                    to: target,
                });
            }
            return Ok(role);
        }
    };

    if role != required_role {
        return Err(AppError::Unauthorized(format!(
            "only the {} can {}",
            required_role.as_str(),
            action.as_str().replace('_', " "),
        )));
    }
    if booking.status != required_status {
        return Err(AppError::InvalidTransition {
            from: booking.status,
            to: target_status(action, role),
        });
    }
    Ok(role)
}
