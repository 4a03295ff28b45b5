//! Indexed-container helpers (§4.6 "Indexing").
//!
//! Lists are 1-based; a nonpositive integer index is redirected to the
//! negative-index side table keyed by the list's identity. Dicts are keyed
//! directly by string keys. These functions are the single place that
//! implements the padding/no-op/out-of-range rules so `Store`/`Index`
//! lowering can stay simple.

use crate::negidx::NegIndex;
use crate::value::Value;

/// Either a list index (checked against `__negIdx` when nonpositive) or a
/// dict string key, matching "Container indices are 1-based when integer...
/// string keys index dictionaries directly."
pub enum Key {
    Int(i64),
    Str(String),
}

pub fn get(container: &Value, key: &Key, neg: &NegIndex) -> Value {
    match (container, key) {
        (Value::List(list), Key::Int(i)) => {
            if *i <= 0 {
                let id = container.identity().expect("list has identity");
                neg.get(id, *i)
            } else {
                list.borrow()
                    .get((*i - 1) as usize)
                    .cloned()
                    .unwrap_or(Value::Null)
            }
        }
        (Value::Dict(dict), Key::Str(k)) => dict.borrow().get(k).cloned().unwrap_or(Value::Null),
        (Value::Str(s), Key::Int(i)) => {
            if *i <= 0 {
                Value::Null
            } else {
                s.chars().nth((*i - 1) as usize).map(|c| Value::str(c.to_string())).unwrap_or(Value::Null)
            }
        }
        _ => Value::Null,
    }
}

pub fn set(container: &Value, key: &Key, value: Value, neg: &mut NegIndex) {
    match (container, key) {
        (Value::List(list), Key::Int(i)) => {
            if *i <= 0 {
                let id = container.identity().expect("list has identity");
                neg.set(id, *i, value);
            } else {
                let idx = (*i - 1) as usize;
                let mut list = list.borrow_mut();
                if idx >= list.len() {
                    list.resize(idx + 1, Value::Null);
                }
                list[idx] = value;
            }
        }
        (Value::Dict(dict), Key::Str(k)) => {
            dict.borrow_mut().insert(k.clone(), value);
        }
        _ => {}
    }
}

pub fn delete(container: &Value, key: &Key, neg: &mut NegIndex) {
    match (container, key) {
        (Value::List(list), Key::Int(i)) => {
            if *i <= 0 {
                let id = container.identity().expect("list has identity");
                neg.delete(id, *i);
            } else {
                let idx = (*i - 1) as usize;
                let mut list = list.borrow_mut();
                if idx < list.len() {
                    list.remove(idx);
                }
                // out-of-range deletion is a no-op
            }
        }
        (Value::Dict(dict), Key::Str(k)) => {
            dict.borrow_mut().shift_remove(k);
        }
        _ => {}
    }
}

pub fn keys(container: &Value) -> Vec<Value> {
    match container {
        Value::List(list) => (1..=list.borrow().len() as i64)
            .map(|i| Value::Number(i as f64))
            .collect(),
        Value::Dict(dict) => dict.borrow().keys().map(|k| Value::str(k.clone())).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_set_beyond_length_pads_with_null() {
        let list = Value::list(vec![Value::Number(1.0)]);
        let mut neg = NegIndex::new();
        set(&list, &Key::Int(3), Value::Number(9.0), &mut neg);
        if let Value::List(l) = &list {
            assert_eq!(
                l.borrow().as_slice(),
                &[Value::Number(1.0), Value::Null, Value::Number(9.0)]
            );
        }
    }

    #[test]
    fn negative_index_roundtrips_through_side_table() {
        let list = Value::list(vec![Value::Number(1.0)]);
        let mut neg = NegIndex::new();
        set(&list, &Key::Int(-1), Value::str("x"), &mut neg);
        let v = get(&list, &Key::Int(-1), &neg);
        assert_eq!(v, Value::str("x"));
    }

    #[test]
    fn out_of_range_delete_is_noop() {
        let list = Value::list(vec![Value::Number(1.0)]);
        let mut neg = NegIndex::new();
        delete(&list, &Key::Int(99), &mut neg);
        if let Value::List(l) = &list {
            assert_eq!(l.borrow().len(), 1);
        }
    }
}
