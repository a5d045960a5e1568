//! Flexbox layout over the instance tree.
//!
//! Every native node in the [`ViewTree`](crate::ViewTree) owns one node in a `taffy` tree. Layout
//! nodes are created when the native node is built and released when it is removed. Styles are
//! refreshed whenever the node's properties change; container children are re-synced wholesale
//! before every layout pass, since components may have swapped out any part of the hierarchy.
//!
//! Unset layout properties follow these defaults (which differ from CSS):
//!
//! - `flex_direction`: column
//! - `align_items`, `align_content`: stretch
//! - `flex_shrink`: 0

use crate::element::{Element, ElementType};
use crate::error::Result;
use crate::properties::{self, LayoutProperties, TextStyleProperties};
use crate::rect::Rect;
use crate::view_tree::ViewId;
use cgmath::Vector2;
use core::fmt;
use taffy::geometry::{Rect as Edges, Size};
use taffy::style::{
    AlignContent, AlignItems, AvailableSpace, Dimension, Display, LengthPercentage,
    LengthPercentageAuto, Position, Style,
};
use taffy::{NodeId, TaffyTree};

/// Font size assumed when a text view doesn't specify one.
pub const DEFAULT_FONT_SIZE: f64 = 14.;

/// Measures text for layout.
pub trait TextMeasurer: Send + Sync + fmt::Debug {
    /// Returns the size of `text` laid out with the given attributes, wrapping at `max_width`
    /// if there is one.
    fn measure(&self, text: &TextStyleProperties, max_width: Option<f64>) -> Vector2<f64>;
}

/// Estimates text sizes from character counts; for headless operation and tests.
///
/// Every character is assumed to be `char_width` ems wide and every line `line_height` ems high.
#[derive(Debug, Clone, Copy)]
pub struct ApproximateTextMeasurer {
    pub char_width: f64,
    pub line_height: f64,
}

impl Default for ApproximateTextMeasurer {
    fn default() -> Self {
        ApproximateTextMeasurer {
            char_width: 0.5,
            line_height: 1.2,
        }
    }
}

impl TextMeasurer for ApproximateTextMeasurer {
    fn measure(&self, text: &TextStyleProperties, max_width: Option<f64>) -> Vector2<f64> {
        let font_size = text.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        let chars = text.text.as_deref().map_or(0, |text| text.chars().count());
        if chars == 0 {
            return Vector2::new(0., 0.);
        }

        let char_width = font_size * self.char_width;
        let line_height = font_size * self.line_height;
        let natural_width = chars as f64 * char_width;

        match max_width {
            Some(max_width) if natural_width > max_width => {
                let per_line = ((max_width / char_width).floor() as usize).max(1);
                let lines = (chars + per_line - 1) / per_line;
                Vector2::new(per_line as f64 * char_width, lines as f64 * line_height)
            }
            _ => Vector2::new(natural_width, line_height),
        }
    }
}

/// Attached to layout nodes that size themselves from their text content.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureContext {
    pub text: TextStyleProperties,
}

/// Computed frames for a native view and its subviews.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    /// The native view this frame belongs to.
    pub id: ViewId,
    /// Relative to the superview.
    pub frame: Rect,
    /// In subview order.
    pub children: Vec<LayoutResult>,
}

impl LayoutResult {
    /// Finds the layout of a view in this subtree.
    pub fn find(&self, id: ViewId) -> Option<&LayoutResult> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

/// Owns the layout tree.
pub struct LayoutBridge {
    taffy: TaffyTree<MeasureContext>,
}

impl LayoutBridge {
    pub fn new() -> LayoutBridge {
        LayoutBridge {
            taffy: TaffyTree::new(),
        }
    }

    /// Number of live layout nodes.
    pub fn len(&self) -> usize {
        self.taffy.total_node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates the layout node for a native element.
    pub(crate) fn create(&mut self, element: &Element) -> Result<NodeId> {
        let style = style_for(&element.properties().core().layout);
        let node = match measure_context(element) {
            Some(context) => self.taffy.new_leaf_with_context(style, context)?,
            None => self.taffy.new_leaf(style)?,
        };
        Ok(node)
    }

    /// Refreshes the style and measure context of a node after its properties changed.
    pub(crate) fn sync(&mut self, node: NodeId, element: &Element) -> Result<()> {
        self.taffy
            .set_style(node, style_for(&element.properties().core().layout))?;
        let context = measure_context(element);
        let measures = context.is_some();
        self.taffy.set_node_context(node, context)?;
        if measures {
            // remeasure
            self.taffy.mark_dirty(node)?;
        }
        Ok(())
    }

    /// Replaces a node's children, unless they're unchanged.
    pub(crate) fn set_children(&mut self, node: NodeId, children: &[NodeId]) -> Result<()> {
        if self.taffy.children(node)? != children {
            self.taffy.set_children(node, children)?;
        }
        Ok(())
    }

    pub(crate) fn release(&mut self, node: NodeId) -> Result<()> {
        self.taffy.remove(node)?;
        Ok(())
    }

    /// Lays out the tree at `root`.
    ///
    /// The root fills the viewport along any axis its own properties leave unsized.
    pub(crate) fn compute(
        &mut self,
        root: NodeId,
        root_layout: &LayoutProperties,
        viewport: Vector2<f64>,
        measurer: &dyn TextMeasurer,
    ) -> Result<()> {
        let mut style = style_for(root_layout);
        if root_layout.width.is_none() {
            style.size.width = Dimension::Length(viewport.x as f32);
        }
        if root_layout.height.is_none() {
            style.size.height = Dimension::Length(viewport.y as f32);
        }
        if self.taffy.style(root)? != &style {
            self.taffy.set_style(root, style)?;
        }

        let available = Size {
            width: AvailableSpace::Definite(viewport.x as f32),
            height: AvailableSpace::Definite(viewport.y as f32),
        };

        self.taffy.compute_layout_with_measure(
            root,
            available,
            |known, available, _node, context, _style| {
                let context = match context {
                    Some(context) => context,
                    None => return Size { width: 0., height: 0. },
                };
                if let (Some(width), Some(height)) = (known.width, known.height) {
                    return Size { width, height };
                }

                let max_width = known.width.or(match available.width {
                    AvailableSpace::Definite(width) => Some(width),
                    _ => None,
                });
                let measured = measurer.measure(&context.text, max_width.map(f64::from));
                Size {
                    width: known.width.unwrap_or(measured.x as f32),
                    height: known.height.unwrap_or(measured.y as f32),
                }
            },
        )?;
        Ok(())
    }

    /// The computed frame of a node, relative to its parent.
    pub(crate) fn frame(&self, node: NodeId) -> Result<Rect> {
        let layout = self.taffy.layout(node)?;
        Ok(Rect::from_xywh(
            f64::from(layout.location.x),
            f64::from(layout.location.y),
            f64::from(layout.size.width),
            f64::from(layout.size.height),
        ))
    }
}

impl Default for LayoutBridge {
    fn default() -> Self {
        LayoutBridge::new()
    }
}

impl fmt::Debug for LayoutBridge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LayoutBridge({} nodes)", self.len())
    }
}

fn measure_context(element: &Element) -> Option<MeasureContext> {
    match element.ty() {
        ElementType::Native(ty) if ty.measures_text() => {
            let text = element.properties().text_style().cloned().unwrap_or_default();
            Some(MeasureContext { text })
        }
        _ => None,
    }
}

fn length(value: Option<f32>) -> Dimension {
    value.map_or(Dimension::Auto, Dimension::Length)
}

fn edge(value: Option<f32>) -> LengthPercentageAuto {
    value.map_or(LengthPercentageAuto::Auto, LengthPercentageAuto::Length)
}

// auto margins would absorb free space and defeat stretching
fn margin(value: Option<f32>) -> LengthPercentageAuto {
    LengthPercentageAuto::Length(value.unwrap_or(0.))
}

fn padding(value: Option<f32>) -> LengthPercentage {
    LengthPercentage::Length(value.unwrap_or(0.))
}

fn align_items(align: properties::Align) -> Option<AlignItems> {
    use properties::Align;
    match align {
        Align::Auto => None,
        Align::FlexStart => Some(AlignItems::FlexStart),
        Align::Center => Some(AlignItems::Center),
        Align::FlexEnd => Some(AlignItems::FlexEnd),
        Align::Stretch => Some(AlignItems::Stretch),
    }
}

fn align_content(align: properties::Align) -> Option<AlignContent> {
    use properties::Align;
    match align {
        Align::Auto => None,
        Align::FlexStart => Some(AlignContent::FlexStart),
        Align::Center => Some(AlignContent::Center),
        Align::FlexEnd => Some(AlignContent::FlexEnd),
        Align::Stretch => Some(AlignContent::Stretch),
    }
}

fn justify(justify: properties::Justify) -> AlignContent {
    use properties::Justify;
    match justify {
        Justify::FlexStart => AlignContent::FlexStart,
        Justify::Center => AlignContent::Center,
        Justify::FlexEnd => AlignContent::FlexEnd,
        Justify::SpaceBetween => AlignContent::SpaceBetween,
        Justify::SpaceAround => AlignContent::SpaceAround,
    }
}

/// Converts layout properties to a taffy style.
pub fn style_for(layout: &LayoutProperties) -> Style {
    use properties::{FlexDirection, FlexWrap, PositionType};

    Style {
        display: Display::Flex,
        position: match layout.position_type {
            Some(PositionType::Absolute) => Position::Absolute,
            _ => Position::Relative,
        },
        flex_direction: match layout.flex_direction.unwrap_or(FlexDirection::Column) {
            FlexDirection::Row => taffy::style::FlexDirection::Row,
            FlexDirection::RowReverse => taffy::style::FlexDirection::RowReverse,
            FlexDirection::Column => taffy::style::FlexDirection::Column,
            FlexDirection::ColumnReverse => taffy::style::FlexDirection::ColumnReverse,
        },
        flex_wrap: match layout.flex_wrap {
            Some(FlexWrap::Wrap) => taffy::style::FlexWrap::Wrap,
            _ => taffy::style::FlexWrap::NoWrap,
        },
        justify_content: layout.justify_content.map(justify),
        align_items: layout
            .align_items
            .map_or(Some(AlignItems::Stretch), align_items),
        align_self: layout.align_self.and_then(align_items),
        align_content: layout
            .align_content
            .map_or(Some(AlignContent::Stretch), align_content),
        flex_grow: layout.flex_grow.unwrap_or(0.),
        flex_shrink: layout.flex_shrink.unwrap_or(0.),
        size: Size {
            width: length(layout.width),
            height: length(layout.height),
        },
        min_size: Size {
            width: length(layout.min_width),
            height: length(layout.min_height),
        },
        max_size: Size {
            width: length(layout.max_width),
            height: length(layout.max_height),
        },
        margin: Edges {
            left: margin(layout.margin_left),
            right: margin(layout.margin_right),
            top: margin(layout.margin_top),
            bottom: margin(layout.margin_bottom),
        },
        padding: Edges {
            left: padding(layout.padding_left),
            right: padding(layout.padding_right),
            top: padding(layout.padding_top),
            bottom: padding(layout.padding_bottom),
        },
        inset: Edges {
            left: edge(layout.left),
            right: edge(layout.right),
            top: edge(layout.top),
            bottom: edge(layout.bottom),
        },
        ..Style::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{DefaultProperties, FlexDirection};

    fn text_style(text: &str, font_size: f64) -> TextStyleProperties {
        TextStyleProperties {
            text: Some(text.into()),
            font_size: Some(font_size),
            ..TextStyleProperties::default()
        }
    }

    #[test]
    fn approximate_measurer_wraps() {
        let measurer = ApproximateTextMeasurer::default();
        let size = measurer.measure(&text_style("hello", 10.), None);
        assert_eq!(size, Vector2::new(25., 12.));

        // 5 chars per line at 25pt
        let size = measurer.measure(&text_style("hello world", 10.), Some(25.));
        assert_eq!(size, Vector2::new(25., 36.));

        assert_eq!(
            measurer.measure(&TextStyleProperties::default(), None),
            Vector2::new(0., 0.)
        );
    }

    #[test]
    fn defaults_differ_from_css() {
        let style = style_for(&LayoutProperties::default());
        assert_eq!(style.flex_direction, taffy::style::FlexDirection::Column);
        assert_eq!(style.align_items, Some(AlignItems::Stretch));
        assert_eq!(style.flex_shrink, 0.);

        let mut layout = LayoutProperties::default();
        layout.flex_direction = Some(FlexDirection::Row);
        layout.width = Some(10.);
        layout.margin_top = Some(2.);
        let style = style_for(&layout);
        assert_eq!(style.flex_direction, taffy::style::FlexDirection::Row);
        assert_eq!(style.size.width, Dimension::Length(10.));
        assert_eq!(style.margin.top, LengthPercentageAuto::Length(2.));
        assert_eq!(style.margin.left, LengthPercentageAuto::Length(0.));
        assert_eq!(style.inset.left, LengthPercentageAuto::Auto);
    }

    #[test]
    fn root_fills_viewport_and_children_stretch() {
        let mut bridge = LayoutBridge::new();
        let root = bridge
            .create(&Element::boxed(DefaultProperties::default(), Vec::new()))
            .unwrap();
        let child = bridge
            .create(&Element::boxed(
                DefaultProperties::default().with_layout(|l| l.height = Some(20.)),
                Vec::new(),
            ))
            .unwrap();
        let mut label_props = DefaultProperties::text("hi");
        label_props.text_style.font_size = Some(10.);
        let label = bridge.create(&Element::text(label_props)).unwrap();
        bridge.set_children(root, &[child, label]).unwrap();
        assert_eq!(bridge.len(), 3);

        bridge
            .compute(
                root,
                &LayoutProperties::default(),
                Vector2::new(100., 50.),
                &ApproximateTextMeasurer::default(),
            )
            .unwrap();

        assert_eq!(bridge.frame(root).unwrap(), Rect::from_xywh(0., 0., 100., 50.));
        assert_eq!(bridge.frame(child).unwrap(), Rect::from_xywh(0., 0., 100., 20.));
        assert_eq!(bridge.frame(label).unwrap(), Rect::from_xywh(0., 20., 100., 12.));

        bridge.release(label).unwrap();
        assert_eq!(bridge.len(), 2);
    }
}
