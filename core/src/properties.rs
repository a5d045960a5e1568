//! Typed, mergeable property bags.
//!
//! Every element carries a property bag. Bags are composed of smaller bags (identifier, layout,
//! style, gestures, ...), each of which can be constructed from untyped template attributes and
//! merged with another bag of the same type. Merging is right-biased: a field that is set in the
//! incoming bag overwrites the existing one, an unset field leaves it alone.

use crate::color::Color;
use crate::events::{EventHandler, GestureEvent};
use crate::value::RawProperties;
use core::any::Any;
use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

/// Property bags that can be constructed from raw template attributes and merged.
pub trait RawPropertiesReceiver: Sized {
    /// Constructs the bag from untyped attributes. Unknown or malformed attributes are ignored.
    fn from_raw(raw: &RawProperties) -> Self;

    /// Merges `other` into `self`; set fields in `other` win.
    fn merge(&mut self, other: &Self);
}

/// Overwrites each listed field of `$self` with the field of `$other` if that one is set.
macro_rules! merge_fields {
    ($self:ident, $other:ident; $($field:ident),+ $(,)*) => {
        $(
            if let Some(value) = &$other.$field {
                $self.$field = Some(value.clone());
            }
        )+
    };
}

/// Implements `FromStr` for a fieldless enum using template attribute spellings.
macro_rules! impl_from_str {
    ($ty:ident { $($name:literal => $variant:ident),+ $(,)* }) => {
        impl FromStr for $ty {
            type Err = ();
            fn from_str(s: &str) -> Result<Self, ()> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(()),
                }
            }
        }
    };
}

/// A complete property bag that can be attached to an element.
pub trait Properties:
    RawPropertiesReceiver + fmt::Debug + Clone + PartialEq + Default + Send + Sync + 'static
{
    fn core(&self) -> &CoreProperties;

    fn core_mut(&mut self) -> &mut CoreProperties;

    /// Text attributes, for views that measure their own content.
    fn text_style(&self) -> Option<&TextStyleProperties> {
        None
    }

    /// The key used to identify the element among its siblings.
    fn key(&self) -> Option<&str> {
        self.core().identifier.key.as_deref()
    }
}

/// Object-safe view of a [`Properties`] bag.
///
/// Implemented for every `Properties` type; elements store their properties as
/// `Arc<dyn AnyProperties>`.
pub trait AnyProperties: fmt::Debug + Send + Sync + 'static {
    /// For downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Compares by value; bags of different types are never equal.
    fn eq_dyn(&self, other: &dyn AnyProperties) -> bool;

    fn core(&self) -> &CoreProperties;

    fn text_style(&self) -> Option<&TextStyleProperties>;

    /// Builds a bag of the same type from `raw` and merges `self` over it.
    fn over_raw(&self, raw: &RawProperties) -> Arc<dyn AnyProperties>;

    fn type_name(&self) -> &'static str;
}

impl<T: Properties> AnyProperties for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn AnyProperties) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(other) => self == other,
            None => false,
        }
    }

    fn core(&self) -> &CoreProperties {
        Properties::core(self)
    }

    fn text_style(&self) -> Option<&TextStyleProperties> {
        Properties::text_style(self)
    }

    fn over_raw(&self, raw: &RawProperties) -> Arc<dyn AnyProperties> {
        let mut base = T::from_raw(raw);
        base.merge(self);
        Arc::new(base)
    }

    fn type_name(&self) -> &'static str {
        core::any::type_name::<T>()
    }
}

impl dyn AnyProperties {
    pub fn downcast_ref<T: Properties>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn key(&self) -> Option<&str> {
        self.core().identifier.key.as_deref()
    }
}

impl PartialEq for dyn AnyProperties {
    fn eq(&self, other: &dyn AnyProperties) -> bool {
        self.eq_dyn(other)
    }
}

/// Identity of an element: its sibling key and stylesheet selectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierProperties {
    pub key: Option<String>,
    pub id: Option<String>,
    pub class_names: Option<Vec<String>>,
}

impl RawPropertiesReceiver for IdentifierProperties {
    fn from_raw(raw: &RawProperties) -> Self {
        IdentifierProperties {
            key: raw.string("key"),
            id: raw.string("id"),
            class_names: raw
                .string("classNames")
                .map(|names| names.split_whitespace().map(String::from).collect()),
        }
    }

    fn merge(&mut self, other: &Self) {
        merge_fields!(self, other; key, id, class_names);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    RowReverse,
    Column,
    ColumnReverse,
}

impl_from_str!(FlexDirection {
    "row" => Row,
    "rowReverse" => RowReverse,
    "column" => Column,
    "columnReverse" => ColumnReverse,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    FlexStart,
    Center,
    FlexEnd,
    SpaceBetween,
    SpaceAround,
}

impl_from_str!(Justify {
    "flexStart" => FlexStart,
    "center" => Center,
    "flexEnd" => FlexEnd,
    "spaceBetween" => SpaceBetween,
    "spaceAround" => SpaceAround,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Auto,
    FlexStart,
    Center,
    FlexEnd,
    Stretch,
}

impl_from_str!(Align {
    "auto" => Auto,
    "flexStart" => FlexStart,
    "center" => Center,
    "flexEnd" => FlexEnd,
    "stretch" => Stretch,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionType {
    Relative,
    Absolute,
}

impl_from_str!(PositionType {
    "relative" => Relative,
    "absolute" => Absolute,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexWrap {
    NoWrap,
    Wrap,
}

impl_from_str!(FlexWrap {
    "noWrap" => NoWrap,
    "wrap" => Wrap,
});

/// Flexbox inputs. Unset fields take the layout engine defaults described in
/// [`crate::layout`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutProperties {
    pub flex_direction: Option<FlexDirection>,
    pub justify_content: Option<Justify>,
    pub align_content: Option<Align>,
    pub align_items: Option<Align>,
    pub align_self: Option<Align>,
    pub position_type: Option<PositionType>,
    pub flex_wrap: Option<FlexWrap>,
    pub flex_grow: Option<f32>,
    pub flex_shrink: Option<f32>,
    pub margin_top: Option<f32>,
    pub margin_bottom: Option<f32>,
    pub margin_left: Option<f32>,
    pub margin_right: Option<f32>,
    pub padding_top: Option<f32>,
    pub padding_bottom: Option<f32>,
    pub padding_left: Option<f32>,
    pub padding_right: Option<f32>,
    pub top: Option<f32>,
    pub bottom: Option<f32>,
    pub left: Option<f32>,
    pub right: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub min_width: Option<f32>,
    pub min_height: Option<f32>,
    pub max_width: Option<f32>,
    pub max_height: Option<f32>,
}

impl RawPropertiesReceiver for LayoutProperties {
    fn from_raw(raw: &RawProperties) -> Self {
        // `margin` and `padding` are shorthands; specific edges take precedence
        let margin = raw.f32("margin");
        let padding = raw.f32("padding");

        LayoutProperties {
            flex_direction: raw.parse("flexDirection"),
            justify_content: raw.parse("justifyContent"),
            align_content: raw.parse("alignContent"),
            align_items: raw.parse("alignItems"),
            align_self: raw.parse("alignSelf"),
            position_type: raw.parse("positionType"),
            flex_wrap: raw.parse("flexWrap"),
            flex_grow: raw.f32("flexGrow"),
            flex_shrink: raw.f32("flexShrink"),
            margin_top: raw.f32("marginTop").or(margin),
            margin_bottom: raw.f32("marginBottom").or(margin),
            margin_left: raw.f32("marginLeft").or(margin),
            margin_right: raw.f32("marginRight").or(margin),
            padding_top: raw.f32("paddingTop").or(padding),
            padding_bottom: raw.f32("paddingBottom").or(padding),
            padding_left: raw.f32("paddingLeft").or(padding),
            padding_right: raw.f32("paddingRight").or(padding),
            top: raw.f32("top"),
            bottom: raw.f32("bottom"),
            left: raw.f32("left"),
            right: raw.f32("right"),
            width: raw.f32("width"),
            height: raw.f32("height"),
            min_width: raw.f32("minWidth"),
            min_height: raw.f32("minHeight"),
            max_width: raw.f32("maxWidth"),
            max_height: raw.f32("maxHeight"),
        }
    }

    fn merge(&mut self, other: &Self) {
        merge_fields!(
            self, other;
            flex_direction, justify_content, align_content, align_items, align_self,
            position_type, flex_wrap, flex_grow, flex_shrink,
            margin_top, margin_bottom, margin_left, margin_right,
            padding_top, padding_bottom, padding_left, padding_right,
            top, bottom, left, right,
            width, height, min_width, min_height, max_width, max_height,
        );
    }
}

/// Visual attributes shared by all native views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleProperties {
    pub background_color: Option<Color>,
    pub border_color: Option<Color>,
    pub border_width: Option<f64>,
    pub corner_radius: Option<f64>,
    pub opacity: Option<f64>,
}

impl RawPropertiesReceiver for StyleProperties {
    fn from_raw(raw: &RawProperties) -> Self {
        StyleProperties {
            background_color: raw.color("backgroundColor"),
            border_color: raw.color("borderColor"),
            border_width: raw.f64("borderWidth"),
            corner_radius: raw.f64("cornerRadius"),
            opacity: raw.f64("opacity"),
        }
    }

    fn merge(&mut self, other: &Self) {
        merge_fields!(self, other; background_color, border_color, border_width, corner_radius, opacity);
    }
}

/// Gesture handlers.
///
/// Handlers cannot be expressed as template attributes, so `from_raw` leaves them unset; they
/// are attached in code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureProperties {
    pub on_tap: Option<EventHandler<GestureEvent>>,
    pub on_press: Option<EventHandler<GestureEvent>>,
    pub on_double_tap: Option<EventHandler<GestureEvent>>,
}

impl RawPropertiesReceiver for GestureProperties {
    fn from_raw(_raw: &RawProperties) -> Self {
        GestureProperties::default()
    }

    fn merge(&mut self, other: &Self) {
        merge_fields!(self, other; on_tap, on_press, on_double_tap);
    }
}

/// Properties every element has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreProperties {
    pub identifier: IdentifierProperties,
    pub layout: LayoutProperties,
    pub style: StyleProperties,
    pub gestures: GestureProperties,
}

impl CoreProperties {
    /// Shorthand for a bag with only a key set.
    pub fn keyed(key: impl Into<String>) -> CoreProperties {
        let mut core = CoreProperties::default();
        core.identifier.key = Some(key.into());
        core
    }
}

impl RawPropertiesReceiver for CoreProperties {
    fn from_raw(raw: &RawProperties) -> Self {
        CoreProperties {
            identifier: IdentifierProperties::from_raw(raw),
            layout: LayoutProperties::from_raw(raw),
            style: StyleProperties::from_raw(raw),
            gestures: GestureProperties::from_raw(raw),
        }
    }

    fn merge(&mut self, other: &Self) {
        self.identifier.merge(&other.identifier);
        self.layout.merge(&other.layout);
        self.style.merge(&other.style);
        self.gestures.merge(&other.gestures);
    }
}

impl Properties for CoreProperties {
    fn core(&self) -> &CoreProperties {
        self
    }

    fn core_mut(&mut self) -> &mut CoreProperties {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBreakMode {
    WordWrap,
    CharWrap,
    Clip,
    TruncateTail,
}

impl_from_str!(LineBreakMode {
    "wordWrap" => WordWrap,
    "charWrap" => CharWrap,
    "clip" => Clip,
    "truncateTail" => TruncateTail,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlignment {
    Left,
    Center,
    Right,
    Justified,
}

impl_from_str!(TextAlignment {
    "left" => Left,
    "center" => Center,
    "right" => Right,
    "justified" => Justified,
});

/// Text content and attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextStyleProperties {
    pub text: Option<String>,
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
    pub color: Option<Color>,
    pub line_break_mode: Option<LineBreakMode>,
    pub text_alignment: Option<TextAlignment>,
}

impl RawPropertiesReceiver for TextStyleProperties {
    fn from_raw(raw: &RawProperties) -> Self {
        TextStyleProperties {
            text: raw.string("text"),
            font_name: raw.string("fontName"),
            font_size: raw.f64("fontSize"),
            color: raw.color("color"),
            line_break_mode: raw.parse("lineBreakMode"),
            text_alignment: raw.parse("textAlignment"),
        }
    }

    fn merge(&mut self, other: &Self) {
        merge_fields!(self, other; text, font_name, font_size, color, line_break_mode, text_alignment);
    }
}

/// The property bag used by boxes, text and most other native views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultProperties {
    pub core: CoreProperties,
    pub text_style: TextStyleProperties,
}

impl DefaultProperties {
    pub fn keyed(key: impl Into<String>) -> DefaultProperties {
        DefaultProperties {
            core: CoreProperties::keyed(key),
            ..DefaultProperties::default()
        }
    }

    /// Text properties with the given content.
    pub fn text(text: impl Into<String>) -> DefaultProperties {
        let mut properties = DefaultProperties::default();
        properties.text_style.text = Some(text.into());
        properties
    }

    /// Builder-style access to the key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.core.identifier.key = Some(key.into());
        self
    }

    /// Builder-style access to the layout properties.
    pub fn with_layout(mut self, f: impl FnOnce(&mut LayoutProperties)) -> Self {
        f(&mut self.core.layout);
        self
    }
}

impl RawPropertiesReceiver for DefaultProperties {
    fn from_raw(raw: &RawProperties) -> Self {
        DefaultProperties {
            core: CoreProperties::from_raw(raw),
            text_style: TextStyleProperties::from_raw(raw),
        }
    }

    fn merge(&mut self, other: &Self) {
        self.core.merge(&other.core);
        self.text_style.merge(&other.text_style);
    }
}

impl Properties for DefaultProperties {
    fn core(&self) -> &CoreProperties {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CoreProperties {
        &mut self.core
    }

    fn text_style(&self) -> Option<&TextStyleProperties> {
        Some(&self.text_style)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    ScaleToFill,
    ScaleAspectFit,
    ScaleAspectFill,
}

impl_from_str!(ContentMode {
    "scaleToFill" => ScaleToFill,
    "scaleAspectFit" => ScaleAspectFit,
    "scaleAspectFill" => ScaleAspectFill,
});

/// Properties of image views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageProperties {
    pub core: CoreProperties,
    pub url: Option<String>,
    pub name: Option<String>,
    pub content_mode: Option<ContentMode>,
}

impl RawPropertiesReceiver for ImageProperties {
    fn from_raw(raw: &RawProperties) -> Self {
        ImageProperties {
            core: CoreProperties::from_raw(raw),
            url: raw.string("url"),
            name: raw.string("name"),
            content_mode: raw.parse("contentMode"),
        }
    }

    fn merge(&mut self, other: &Self) {
        self.core.merge(&other.core);
        merge_fields!(self, other; url, name, content_mode);
    }
}

impl Properties for ImageProperties {
    fn core(&self) -> &CoreProperties {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CoreProperties {
        &mut self.core
    }
}
