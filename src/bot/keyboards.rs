//! Reply and inline keyboards for the selection flow

use crate::delivery::{InlineButton, Keyboard, KeyboardButton};

pub const CALLBACK_KIND_PREFIX: &str = "report_";
pub const CALLBACK_PERIOD_PREFIX: &str = "period_";

fn inline(text: &str, callback_data: &str) -> Vec<InlineButton> {
    vec![InlineButton {
        text: text.to_string(),
        callback_data: callback_data.to_string(),
    }]
}

/// Persistent reply keyboard with the two top-level commands
pub fn main_keyboard() -> Keyboard {
    Keyboard::Reply {
        keyboard: vec![vec![
            KeyboardButton {
                text: "/report".to_string(),
            },
            KeyboardButton {
                text: "/stats".to_string(),
            },
        ]],
        resize_keyboard: true,
    }
}

pub fn kind_keyboard() -> Keyboard {
    Keyboard::Inline {
        inline_keyboard: vec![
            inline("Sales", "report_sales"),
            inline("User activity", "report_activity"),
        ],
    }
}

pub fn period_keyboard() -> Keyboard {
    Keyboard::Inline {
        inline_keyboard: vec![
            inline("Day", "period_day"),
            inline("Week", "period_week"),
            inline("Month", "period_month"),
            inline("Year", "period_year"),
            inline("Custom range", "period_custom"),
        ],
    }
}
