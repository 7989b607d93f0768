//! Fixtures shared by the crate's tests: an `Order`/`Item` model, its
//! template, and a listener that records created and discarded entities.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::ViewContext;
use crate::listener::{EntityEvent, ViewListener};
use crate::model::{DataType, ModelType, ObjectRef, ScalarKind, Value};
use crate::template::{Template, TemplateBuilder};

pub fn item_type() -> ModelType {
    ModelType::builder("Item")
        .scalar("sku", ScalarKind::String)
        .scalar("qty", ScalarKind::Int)
        .build()
}

/// `Order{id, items: List<Item>, total}` where `total` is the read-only sum
/// of the item quantities.
pub fn order_type(_item: &ModelType) -> ModelType {
    ModelType::builder("Order")
        .scalar("id", ScalarKind::Int)
        .list("items")
        .computed(
            "total",
            DataType::Scalar(ScalarKind::Int),
            |order: &ObjectRef| {
                let Value::List(items) = order.get("items") else {
                    return Value::from(0);
                };
                let total: i64 = items
                    .snapshot()
                    .iter()
                    .filter_map(|v| v.as_object().and_then(|o| o.scalar("qty").as_int()))
                    .sum();
                Value::from(total)
            },
            None::<fn(&ObjectRef, Value)>,
        )
        .build()
}

pub fn order_template(order: &ModelType, item: &ModelType) -> Template {
    TemplateBuilder::for_object(order)
        .value("id")
        .value("total")
        .array_of_objects("items", item)
        .identity(["sku"])
        .value("sku")
        .value("qty")
        .end()
        .build()
        .unwrap()
}

pub fn item(item_type: &ModelType, sku: &str, qty: i64) -> ObjectRef {
    ObjectRef::new(item_type).with("sku", sku).with("qty", qty)
}

pub fn order(order_type: &ModelType, item_type: &ModelType, id: i64, items: &[(&str, i64)]) -> ObjectRef {
    let order = ObjectRef::new(order_type).with("id", id);
    if let Value::List(list) = order.get("items") {
        for (sku, qty) in items {
            list.push(item(item_type, sku, *qty));
        }
    }
    order
}

/// `(sku, qty)` of every item, in list order.
pub fn items_of(order: &ObjectRef) -> Vec<(String, i64)> {
    let Value::List(list) = order.get("items") else {
        return Vec::new();
    };
    list.snapshot()
        .iter()
        .filter_map(|v| v.as_object())
        .map(|o| {
            let sku = o.scalar("sku").as_str().unwrap_or_default().to_string();
            (sku, o.scalar("qty").as_int().unwrap_or_default())
        })
        .collect()
}

/// Records the `sku` of every created and discarded entity.
#[derive(Default)]
pub struct Log {
    pub created: RefCell<Vec<String>>,
    pub discarded: RefCell<Vec<String>>,
}

impl ViewListener for Log {
    fn entity_created(&self, event: &EntityEvent<'_>) {
        self.created.borrow_mut().push(event.entity.scalar("sku").to_string());
    }

    fn entity_discarded(&self, event: &EntityEvent<'_>) {
        self.discarded.borrow_mut().push(event.entity.scalar("sku").to_string());
    }
}

pub fn logged_context() -> (ViewContext, Rc<Log>) {
    let log = Rc::new(Log::default());
    let mut ctx = ViewContext::new();
    ctx.add_listener(log.clone());
    (ctx, log)
}

mod properties {
    use proptest::prelude::*;

    use super::*;
    use crate::discriminator::SimpleDiscriminator;
    use crate::event::{Event, EventKind, View};
    use crate::model::SetRef;
    use std::sync::Arc;

    fn skus() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::btree_set(0u8..16, 0..8)
            .prop_map(|set| set.into_iter().map(|n| format!("S{n}")).collect::<Vec<_>>())
            .prop_shuffle()
    }

    fn items_view(items: &[(String, i64)]) -> View {
        let mut events = vec![Event::begin_object(None), Event::begin_array(Some("items"))];
        for (sku, qty) in items {
            events.push(Event::begin_object(None));
            events.push(Event::value("sku", sku.as_str()));
            events.push(Event::value("qty", *qty));
            events.push(Event::end_object());
        }
        events.push(Event::end_array());
        events.push(Event::end_object());
        View::new(events)
    }

    proptest! {
        #[test]
        fn test_round_trip(id in any::<i64>(), skus in skus(), qty in 0i64..100) {
            let item = item_type();
            let order_ty = order_type(&item);
            let template = order_template(&order_ty, &item);
            let items: Vec<(&str, i64)> = skus.iter().map(|s| (s.as_str(), qty)).collect();
            let model = order(&order_ty, &item, id, &items);

            let view = template.generate(&Value::Object(model.clone()), &mut ViewContext::new()).unwrap();
            let copy = template.apply_new(&view, &mut ViewContext::new()).unwrap();
            let copy = copy.as_object().unwrap();
            prop_assert_eq!(copy.scalar("id").as_int(), Some(id));
            prop_assert_eq!(items_of(copy), items_of(&model));
            let again = template.generate(&Value::Object(copy.clone()), &mut ViewContext::new()).unwrap();
            prop_assert_eq!(again, view);
        }

        #[test]
        fn test_ordering_preservation(live in skus(), incoming in skus()) {
            let item = item_type();
            let order_ty = order_type(&item);
            let template = order_template(&order_ty, &item);
            let live_items: Vec<(&str, i64)> = live.iter().map(|s| (s.as_str(), 1)).collect();
            let model = order(&order_ty, &item, 1, &live_items);
            let incoming: Vec<(String, i64)> = incoming.into_iter().map(|s| (s, 2)).collect();

            let (mut ctx, log) = logged_context();
            template.apply(&items_view(&incoming), &Value::Object(model.clone()), &mut ctx).unwrap();

            prop_assert_eq!(items_of(&model), incoming.clone());
            let matched = incoming.iter().filter(|(s, _)| live.contains(s)).count();
            prop_assert_eq!(log.created.borrow().len(), incoming.len() - matched);
            prop_assert_eq!(log.discarded.borrow().len(), live.len() - matched);
        }

        #[test]
        fn test_unordered_is_permutation_invariant(skus in skus(), seed in any::<u64>()) {
            let item = item_type();
            let bag = ModelType::builder("Bag").set("items").build();
            let template = TemplateBuilder::for_object(&bag)
                .array_of_objects("items", &item)
                .identity(["sku"])
                .value("sku")
                .value("qty")
                .end()
                .build()
                .unwrap();
            let owner = ObjectRef::new(&bag);
            let set = SetRef::new();
            for sku in &skus {
                set.insert(super::item(&item, sku, 1));
            }
            owner.set("items", set.clone());

            let mut permuted: Vec<(String, i64)> = skus.iter().map(|s| (s.clone(), 1)).collect();
            if !permuted.is_empty() {
                let len = permuted.len();
                permuted.rotate_left((seed as usize) % len);
            }
            let (mut ctx, log) = logged_context();
            template.apply(&items_view(&permuted), &Value::Object(owner), &mut ctx).unwrap();
            prop_assert!(log.created.borrow().is_empty());
            prop_assert!(log.discarded.borrow().is_empty());
            prop_assert_eq!(set.len(), skus.len());
        }
    }

    #[test]
    fn test_concrete_order_scenario() {
        let item = item_type();
        let order_ty = order_type(&item);
        let template = order_template(&order_ty, &item);
        let model = order(&order_ty, &item, 1, &[("A", 1), ("B", 2)]);
        let b = match order_ty_items(&model).get(1) {
            Some(Value::Object(b)) => b.clone(),
            _ => panic!("missing B"),
        };

        let (mut ctx, log) = logged_context();
        let incoming = vec![("B".to_string(), 5), ("C".to_string(), 1)];
        template.apply(&items_view(&incoming), &Value::Object(model.clone()), &mut ctx).unwrap();

        assert_eq!(items_of(&model), incoming);
        assert!(order_ty_items(&model)[0].as_object().unwrap().ptr_eq(&b));
        assert_eq!(*log.created.borrow(), vec!["C"]);
        assert_eq!(*log.discarded.borrow(), vec!["A"]);
    }

    fn order_ty_items(order: &ObjectRef) -> Vec<Value> {
        match order.get("items") {
            Value::List(list) => list.snapshot(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_keyed_map_replaces_by_key() {
        let item = item_type();
        let catalog = ModelType::builder("Catalog").map("items", ScalarKind::String).build();
        let template = TemplateBuilder::for_object(&catalog)
            .map_of_objects("items", &item)
            .identity(["sku"])
            .value("sku")
            .value("qty")
            .end()
            .build()
            .unwrap();
        let owner = ObjectRef::new(&catalog);
        let a = super::item(&item, "A", 1);
        let b = super::item(&item, "B", 2);
        if let Value::Map(map) = owner.get("items") {
            map.insert("a", a.clone());
            map.insert("b", b.clone());
        }
        let view = View::new(vec![
            Event::begin_object(None),
            Event::begin_object(Some("items")),
            Event::begin_object(Some("a")),
            Event::value("sku", "A"),
            Event::value("qty", 1),
            Event::end_object(),
            Event::begin_object(Some("b")),
            Event::value("sku", "B"),
            Event::value("qty", 7),
            Event::end_object(),
            Event::end_object(),
            Event::end_object(),
        ]);
        let (mut ctx, log) = logged_context();
        template.apply(&view, &Value::Object(owner.clone()), &mut ctx).unwrap();
        assert!(log.created.borrow().is_empty());
        assert!(log.discarded.borrow().is_empty());
        assert_eq!(b.scalar("qty").as_int(), Some(7));
        assert_eq!(a.scalar("qty").as_int(), Some(1));
    }

    #[test]
    fn test_subtype_round_trip() {
        let pet = ModelType::builder("Pet")
            .abstract_type()
            .scalar("name", ScalarKind::String)
            .build();
        let dog = ModelType::builder("Dog")
            .extends(&pet)
            .scalar("breed", ScalarKind::String)
            .build();
        let cat = ModelType::builder("Cat")
            .extends(&pet)
            .scalar("lives", ScalarKind::Int)
            .build();
        let owner = ModelType::builder("Owner").object("pet").build();
        let template = TemplateBuilder::for_object(&owner)
            .object("pet", &pet)
            .discriminator_with("kind", Arc::new(SimpleDiscriminator))
            .value("name")
            .subtype(&dog)
            .value("breed")
            .end()
            .subtype(&cat)
            .value("lives")
            .end()
            .end()
            .build()
            .unwrap();

        let model = ObjectRef::new(&owner).with(
            "pet",
            ObjectRef::new(&cat).with("name", "Tom").with("lives", 9),
        );
        let view = template.generate(&Value::Object(model), &mut ViewContext::new()).unwrap();
        let discriminator = view
            .iter()
            .find(|e| e.kind() == EventKind::Discriminator)
            .and_then(|e| e.scalar().cloned());
        assert_eq!(discriminator, Some("Cat".into()));

        let copy = template.apply_new(&view, &mut ViewContext::new()).unwrap();
        let copied_pet = copy.as_object().unwrap().get("pet");
        let copied_pet = copied_pet.as_object().unwrap();
        assert_eq!(copied_pet.model_type(), cat);
        assert_eq!(copied_pet.scalar("lives").as_int(), Some(9));
        assert!(copied_pet.get("breed").is_null());
    }
}
