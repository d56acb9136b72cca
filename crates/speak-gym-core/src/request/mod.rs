mod feedback;
mod ticket;

pub use {
    feedback::{FeedbackBoard, FeedbackState},
    ticket::{InFlightRequests, RequestTicket},
};
