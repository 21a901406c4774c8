//! Visible appearances for signature fields whose value is an image.
//!
//! A signature value such as `data:image/png;base64,...` is not stored in
//! `/V`. Instead the image is embedded as an image XObject, wrapped in a
//! form XObject sized to the widget, and hung on the widget's `/AP /N`.

use base64::Engine;

use crate::decoders;
use crate::dict_scan;
use crate::error::{Error, Result};
use crate::object::ObjectRef;

use super::field_index;
use super::object_store::ObjectStore;

/// Attaches an appearance built from image data to a signature field.
///
/// Implementations queue their objects through `store`. A failure is
/// reported to the caller, which rolls the provider's patches back and
/// carries on; it never fails the field action itself.
pub trait SignatureAppearance {
    /// Build and attach the appearance for `field_ref`.
    fn attach(
        &self,
        store: &mut ObjectStore,
        field_ref: ObjectRef,
        image_data: &str,
        width: f64,
        height: f64,
    ) -> Result<()>;
}

/// Run `provider`, undoing its patches if it fails.
///
/// Returns whether the appearance was attached.
pub(crate) fn attach_best_effort(
    store: &mut ObjectStore,
    provider: &dyn SignatureAppearance,
    field_ref: ObjectRef,
    image_data: &str,
    width: f64,
    height: f64,
) -> bool {
    let checkpoint = store.checkpoint();
    match provider.attach(store, field_ref, image_data, width, height) {
        Ok(()) => {
            log::debug!("signature appearance attached to {}", field_ref);
            true
        },
        Err(e) => {
            log::warn!("signature appearance for {} skipped: {}", field_ref, e);
            store.rollback(checkpoint);
            false
        },
    }
}

/// Default provider: PNG or JPEG from a data URI or bare base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSignatureAppearance;

/// Decoded pixels ready to embed.
struct EmbeddedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl ImageSignatureAppearance {
    fn decode(image_data: &str) -> Result<EmbeddedImage> {
        let encoded = match image_data.strip_prefix("data:") {
            Some(uri) => uri
                .split_once(',')
                .map(|(_, payload)| payload)
                .ok_or_else(|| Error::Image("data URI without payload".to_string()))?,
            None => image_data,
        };
        let cleaned: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| Error::Image(format!("invalid base64: {}", e)))?;

        let img = image::load_from_memory(&bytes).map_err(|e| Error::Image(e.to_string()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Image("empty image".to_string()));
        }

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }
        let opaque = alpha.iter().all(|a| *a == 0xFF);

        Ok(EmbeddedImage {
            width,
            height,
            rgb,
            alpha: (!opaque).then_some(alpha),
        })
    }
}

impl SignatureAppearance for ImageSignatureAppearance {
    fn attach(
        &self,
        store: &mut ObjectStore,
        field_ref: ObjectRef,
        image_data: &str,
        width: f64,
        height: f64,
    ) -> Result<()> {
        let widgets = field_index::widgets_of(store, field_ref);
        if widgets.is_empty() {
            return Err(Error::MalformedStructure(format!("field {} has no widget", field_ref)));
        }
        let image = Self::decode(image_data)?;

        let smask_ref = match &image.alpha {
            Some(alpha) => {
                let data = decoders::compress(alpha)?;
                let smask_ref = store.fresh_ref();
                let body = image_dictionary(image.width, image.height, "/DeviceGray", data.len(), None);
                store.push_stream_object(smask_ref, body, data);
                Some(smask_ref)
            },
            None => None,
        };

        let data = decoders::compress(&image.rgb)?;
        let image_ref = store.fresh_ref();
        let body = image_dictionary(image.width, image.height, "/DeviceRGB", data.len(), smask_ref);
        store.push_stream_object(image_ref, body, data);

        let w = dict_scan::format_number(width);
        let h = dict_scan::format_number(height);
        let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im1 Do\nQ\n", w, h);
        let form_ref = store.fresh_ref();
        let form = format!(
            "<<\n  /Type /XObject\n  /Subtype /Form\n  /BBox [0 0 {} {}]\n  /Resources << /XObject << /Im1 {} >> >>\n  /Length {}\n>>",
            w,
            h,
            image_ref,
            content.len()
        );
        store.push_stream_object(form_ref, form, content.into_bytes());

        for widget in widgets {
            let original = store.get_object_body_with_patch(widget)?;
            let updated = dict_scan::upsert_key_value(&original, "/AP", &format!("<< /N {} >>", form_ref));
            store.apply_patch(widget, &updated, &original);
        }
        Ok(())
    }
}

fn image_dictionary(width: u32, height: u32, color_space: &str, length: usize, smask: Option<ObjectRef>) -> String {
    let mut body = format!(
        "<<\n  /Type /XObject\n  /Subtype /Image\n  /Width {}\n  /Height {}\n  /ColorSpace {}\n  /BitsPerComponent 8\n  /Filter /FlateDecode\n  /Length {}\n",
        width, height, color_space, length
    );
    if let Some(smask) = smask {
        body.push_str(&format!("  /SMask {}\n", smask));
    }
    body.push_str(">>");
    body
}
