// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::validation::{
    ValidationError, parse_required_cents, parse_required_int, parse_required_text,
};
use crate::{ItemField, ItemFields, ItemRecord};

/// Text buffers backing the product create/edit dialog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemForm {
    values: [String; 5],
    focus: usize,
}

impl ItemForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        for value in &mut self.values {
            value.clear();
        }
        self.focus = 0;
    }

    pub fn set_values(&mut self, fields: &ItemFields) {
        for field in ItemField::ALL {
            self.values[field.index()] = fields.input_value(field);
        }
        self.focus = 0;
    }

    /// Populates from a full record; the identifier is not a form field and
    /// is ignored here.
    pub fn populate(&mut self, record: &ItemRecord) {
        self.set_values(&record.fields);
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(String::is_empty)
    }

    pub fn field_value(&self, field: ItemField) -> &str {
        &self.values[field.index()]
    }

    pub fn set_field(&mut self, field: ItemField, value: impl Into<String>) {
        self.values[field.index()] = value.into();
    }

    pub fn focused_field(&self) -> ItemField {
        ItemField::ALL[self.focus]
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % ItemField::ALL.len();
    }

    pub fn focus_prev(&mut self) {
        let len = ItemField::ALL.len();
        self.focus = (self.focus + len - 1) % len;
    }

    pub fn insert_char(&mut self, ch: char) {
        self.values[self.focus].push(ch);
    }

    pub fn backspace(&mut self) {
        self.values[self.focus].pop();
    }

    pub fn clear_field(&mut self) {
        self.values[self.focus].clear();
    }

    pub fn validate(&self) -> Result<ItemFields> {
        let name = self.required_text(ItemField::Name)?;
        let description = self.required_text(ItemField::Description)?;
        let category = self.required_text(ItemField::Category)?;
        let price_cents = match parse_required_cents(self.field_value(ItemField::Price)) {
            Ok(cents) => cents,
            Err(ValidationError::Blank) => bail!(required_message(ItemField::Price)),
            Err(_) => bail!("price must be a number like 10 or 10.50 -- fix the price and retry"),
        };
        let amount = match parse_required_int(self.field_value(ItemField::Amount)) {
            Ok(amount) => amount,
            Err(ValidationError::Blank) => bail!(required_message(ItemField::Amount)),
            Err(_) => bail!("amount must be a whole number -- fix the amount and retry"),
        };

        Ok(ItemFields {
            name,
            description,
            category,
            price_cents,
            amount,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn required_text(&self, field: ItemField) -> Result<String> {
        match parse_required_text(self.field_value(field)) {
            Ok(value) => Ok(value),
            Err(_) => bail!(required_message(field)),
        }
    }
}

fn required_message(field: ItemField) -> String {
    format!("{} is required -- enter a value and retry", field.as_str())
}
