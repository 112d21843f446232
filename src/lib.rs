pub mod allow_list;
pub mod codec;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod lockfile;
pub mod media;
pub mod observability;
pub mod packet;
pub mod presets;
pub mod profile;
pub mod stream;
pub mod validation;

pub use codec::{CodecDescriptor, CodecRegistry};
pub use config::TranscodeConfig;
pub use context::{ContextFactory, PacketSink, ProcessingContext};
pub use directory::ProfileDirectory;
pub use error::{TranscodeError, TranscodeResult};
pub use media::{MediaKind, StreamType};
pub use packet::{ConfigBlob, Packet};
pub use profile::CodecProfile;
pub use stream::{SourceStream, Stream, StreamMode, destroy_stream};
