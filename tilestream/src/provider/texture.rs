//! Imagery layer source backed by a tile URL template.

use tracing::trace;

use crate::area::BoundedArea;
use crate::layer::{BoxFuture, LayerSource, SourceError};
use crate::render::Texture;
use crate::tile::TileAddress;

use super::{AsyncHttpClient, UrlTemplate};

/// Downloads imagery tiles and decodes them with the `image` crate.
pub struct UrlTemplateTextureSource<C> {
    template: UrlTemplate,
    client: C,
}

impl<C: AsyncHttpClient> UrlTemplateTextureSource<C> {
    pub fn new(template: UrlTemplate, client: C) -> Self {
        Self { template, client }
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

pub(crate) fn decode_texture(bytes: &[u8]) -> Result<Texture, SourceError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| SourceError::Decode(format!("Invalid image: {}", e)))?;
    Ok(Texture::from(image.to_rgba8()))
}

impl<C: AsyncHttpClient> LayerSource for UrlTemplateTextureSource<C> {
    type Data = Texture;

    fn fetch<'a>(
        &'a self,
        tile: TileAddress,
        _area: &'a BoundedArea,
    ) -> BoxFuture<'a, Result<Texture, SourceError>> {
        Box::pin(async move {
            let url = self.template.expand(tile);
            let bytes = self.client.get(&url).await?;
            trace!(%tile, bytes = bytes.len(), "Decoding imagery");
            decode_texture(&bytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::http::mock::MockHttpClient;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn source(client: MockHttpClient) -> UrlTemplateTextureSource<MockHttpClient> {
        let template = UrlTemplate::parse("test", "http://t/{zoom}/{x}/{y}.png", vec![]).unwrap();
        UrlTemplateTextureSource::new(template, client)
    }

    #[tokio::test]
    async fn test_fetch_decodes_png() {
        let source = source(MockHttpClient::ok(png(4, 2, [10, 20, 30, 255])));
        let tile = TileAddress::new(2, 1, 3);

        let texture = source.fetch(tile, &tile.area()).await.unwrap();
        assert_eq!((texture.width(), texture.height()), (4, 2));
        assert_eq!(texture.pixel(3, 1), Some([10, 20, 30, 255]));
        assert_eq!(source.client().urls(), vec!["http://t/3/2/1.png".to_string()]);
    }

    #[tokio::test]
    async fn test_garbage_is_a_decode_error() {
        let source = source(MockHttpClient::ok(vec![0, 1, 2, 3]));
        let tile = TileAddress::new(0, 0, 0);
        assert!(matches!(
            source.fetch(tile, &tile.area()).await,
            Err(SourceError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_http_error_passes_through() {
        let source = source(MockHttpClient::failing("HTTP 404"));
        let tile = TileAddress::new(0, 0, 0);
        assert!(matches!(
            source.fetch(tile, &tile.area()).await,
            Err(SourceError::Http(_))
        ));
    }
}
