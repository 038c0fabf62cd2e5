use crate::models::Properties;

pub(crate) trait Sanitize {
    fn sanitize(&mut self);
}

/// Shortens `value` to at most `max_len` characters.
pub(crate) fn truncate(value: &mut String, max_len: usize) {
    if let Some((end, _)) = value.char_indices().nth(max_len) {
        value.truncate(end);
    }
}

impl Sanitize for Properties {
    fn sanitize(&mut self) {
        let long_keys: Vec<_> = self
            .keys()
            .filter(|k| k.chars().count() > 150)
            .map(|k| k.to_owned())
            .collect();
        for long_key in long_keys {
            let (mut key, value) = self
                .remove_entry(&long_key)
                .expect("value needs to exist. got key by iterating over map");
            truncate(&mut key, 150);
            if let Some(previous) = self.insert(key, value) {
                tracing::debug!(
                    target: "application_insights",
                    key = %long_key,
                    previous = %previous,
                    "truncated property name overrides property with the same name"
                );
            }
        }
        for value in self.values_mut() {
            truncate(value, 8192);
        }
    }
}
