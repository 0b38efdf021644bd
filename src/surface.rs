use std::{collections::HashMap, io::Write, sync::Arc};

use crossbeam::atomic::AtomicCell;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoverLocation
{
   pub longitude: f64,
   pub latitude:  f64,
}

/// One-way outbound channel for hover locations. `None` clears the hover on the target.
pub trait LocationSink
{
   fn dispatch(&mut self, target: &str, location: Option<HoverLocation>);
}

impl<S: LocationSink + ?Sized> LocationSink for Box<S>
{
   fn dispatch(&mut self, target: &str, location: Option<HoverLocation>) { (**self).dispatch(target, location) }
}

/// Latest hover location published to a named map surface.
#[derive(Clone, Default)]
pub struct MapSurface
{
   location: Arc<AtomicCell<Option<HoverLocation>>>,
}

impl MapSurface
{
   pub fn location(&self) -> Option<HoverLocation> { self.location.load() }

   fn store(&self, location: Option<HoverLocation>) { self.location.store(location) }
}

/// Registry of map surfaces addressed by string id. The id is resolved on every dispatch, so a
/// surface registered after the controller was created still receives updates.
#[derive(Clone, Default)]
pub struct MapSurfaces
{
   surfaces: Arc<RwLock<HashMap<String, MapSurface>>>,
}

impl MapSurfaces
{
   pub fn new() -> Self { Self::default() }

   /// Returns the surface for `target`, creating it if needed.
   pub fn register(&self, target: &str) -> MapSurface
   //-------------------------------------------------
   {
      let mut surfaces = self.surfaces.write();
      surfaces.entry(target.to_string()).or_default().clone()
   }

   pub fn unregister(&self, target: &str) -> bool { self.surfaces.write().remove(target).is_some() }

   pub fn resolve(&self, target: &str) -> Option<MapSurface> { self.surfaces.read().get(target).cloned() }
}

impl LocationSink for MapSurfaces
{
   fn dispatch(&mut self, target: &str, location: Option<HoverLocation>)
   {
      match self.resolve(target)
      {
         | Some(surface) => surface.store(location),
         | None => debug!("No map surface '{}' registered, dropping hover update {:?}", target, location),
      }
   }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoverEvent<'a>
{
   pub target:   &'a str,
   pub location: Option<HoverLocation>,
}

/// Writes each dispatch as one JSON line, e.g. for piping hover events to another process.
pub struct JsonLinesSink<W: Write>
{
   writer: W,
}

impl<W: Write> JsonLinesSink<W>
{
   pub fn new(writer: W) -> Self { Self { writer } }

   pub fn into_inner(self) -> W { self.writer }
}

impl<W: Write> LocationSink for JsonLinesSink<W>
{
   fn dispatch(&mut self, target: &str, location: Option<HoverLocation>)
   //-------------------------------------------------------------------
   {
      let event = HoverEvent { target, location };
      let result = serde_json::to_writer(&mut self.writer, &event).map_err(std::io::Error::from)
                                                                   .and_then(|_| self.writer.write_all(b"\n"))
                                                                   .and_then(|_| self.writer.flush());
      if let Err(e) = result
      {
         warn!("Failed to write hover event for '{}': {}", target, e);
      }
   }
}
