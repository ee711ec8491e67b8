//! SFTP status codes and their meaning.
//!
//! The file transfer collaborator translates protocol status codes into
//! this taxonomy before surfacing them. Codes outside the table map to
//! [`SftpError::Unknown`] instead of failing.

use thiserror::Error;

/// SFTP failure kinds, keyed by protocol status code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SftpError {
    /// `SSH_FX_OK`
    #[error("Successful completion of the operation")]
    Ok,
    /// `SSH_FX_EOF`
    #[error("An attempt to read past the end-of-file was made; or, there are no more directory entries to return")]
    Eof,
    /// `SSH_FX_NO_SUCH_FILE`
    #[error("A reference was made to a file which does not exist")]
    NoSuchFile,
    /// `SSH_FX_PERMISSION_DENIED`
    #[error("The user does not have sufficient permissions to perform the operation")]
    PermissionDenied,
    /// `SSH_FX_FAILURE`
    #[error("An error occurred")]
    Failure,
    /// `SSH_FX_BAD_MESSAGE`
    #[error("A badly formatted packet or other SFTP protocol incompatibility was detected")]
    BadMessage,
    /// `SSH_FX_NO_CONNECTION`
    #[error("There is no connection to the server")]
    NoConnection,
    /// `SSH_FX_CONNECTION_LOST`
    #[error("The connection to the server was lost")]
    ConnectionLost,
    /// `SSH_FX_OP_UNSUPPORTED`
    #[error("An attempted operation could not be completed by the server because the server does not support the operation")]
    OpUnsupported,
    /// `SSH_FX_INVALID_HANDLE`
    #[error("The handle value was invalid")]
    InvalidHandle,
    /// `SSH_FX_NO_SUCH_PATH`
    #[error("The file path does not exist or is invalid")]
    NoSuchPath,
    /// `SSH_FX_FILE_ALREADY_EXISTS`
    #[error("The file already exists")]
    FileAlreadyExists,
    /// `SSH_FX_WRITE_PROTECT`
    #[error("The file is on read-only media, or the media is write protected")]
    WriteProtect,
    /// `SSH_FX_NO_MEDIA`
    #[error("The requested operation cannot be completed because there is no media available in the drive")]
    NoMedia,
    /// `SSH_FX_NO_SPACE_ON_FILESYSTEM`
    #[error("The requested operation cannot be completed because there is insufficient free space on the filesystem")]
    NoSpaceOnFilesystem,
    /// `SSH_FX_QUOTA_EXCEEDED`
    #[error("The operation cannot be completed because it would exceed the user's storage quota")]
    QuotaExceeded,
    /// `SSH_FX_UNKNOWN_PRINCIPAL`
    #[error("A principal referenced by the request was unknown")]
    UnknownPrincipal,
    /// `SSH_FX_LOCK_CONFLICT`
    #[error("The file could not be opened because it is locked by another process")]
    LockConflict,
    /// `SSH_FX_DIR_NOT_EMPTY`
    #[error("The directory is not empty")]
    DirNotEmpty,
    /// `SSH_FX_NOT_A_DIRECTORY`
    #[error("The specified file is not a directory")]
    NotADirectory,
    /// `SSH_FX_INVALID_FILENAME`
    #[error("The filename is not valid")]
    InvalidFilename,
    /// `SSH_FX_LINK_LOOP`
    #[error("Too many symbolic links encountered")]
    LinkLoop,
    /// `SSH_FX_CANNOT_DELETE`
    #[error("The file cannot be deleted. One possible reason is that the advisory READONLY attribute-bit is set")]
    CannotDelete,
    /// `SSH_FX_INVALID_PARAMETER`
    #[error("One of the parameters was out of range")]
    InvalidParameter,
    /// `SSH_FX_FILE_IS_A_DIRECTORY`
    #[error("The specified file was a directory in a context where a directory cannot be used")]
    FileIsADirectory,
    /// `SSH_FX_BYTE_RANGE_LOCK_CONFLICT`
    #[error("An read or write operation failed because another process's mandatory byte-range lock overlaps with the request")]
    ByteRangeLockConflict,
    /// `SSH_FX_BYTE_RANGE_LOCK_REFUSED`
    #[error("A request for a byte range lock was refused")]
    ByteRangeLockRefused,
    /// `SSH_FX_DELETE_PENDING`
    #[error("An operation was attempted on a file for which a delete operation is pending")]
    DeletePending,
    /// `SSH_FX_FILE_CORRUPT`
    #[error("The file is corrupt")]
    FileCorrupt,
    /// `SSH_FX_OWNER_INVALID`
    #[error("The principal specified can not be assigned as an owner of a file")]
    OwnerInvalid,
    /// `SSH_FX_GROUP_INVALID`
    #[error("The principal specified can not be assigned as the primary group of a file")]
    GroupInvalid,
    /// `SSH_FX_NO_MATCHING_BYTE_RANGE_LOCK`
    #[error("The requested operation could not be completed because the specified byte range lock has not been granted")]
    NoMatchingByteRangeLock,

    /// A status code not listed in the protocol table
    #[error("Unknown SFTP status code {0}")]
    Unknown(u32),
}

impl SftpError {
    /// Map a protocol status code to its kind.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => SftpError::Ok,
            1 => SftpError::Eof,
            2 => SftpError::NoSuchFile,
            3 => SftpError::PermissionDenied,
            4 => SftpError::Failure,
            5 => SftpError::BadMessage,
            6 => SftpError::NoConnection,
            7 => SftpError::ConnectionLost,
            8 => SftpError::OpUnsupported,
            9 => SftpError::InvalidHandle,
            10 => SftpError::NoSuchPath,
            11 => SftpError::FileAlreadyExists,
            12 => SftpError::WriteProtect,
            13 => SftpError::NoMedia,
            14 => SftpError::NoSpaceOnFilesystem,
            15 => SftpError::QuotaExceeded,
            16 => SftpError::UnknownPrincipal,
            17 => SftpError::LockConflict,
            18 => SftpError::DirNotEmpty,
            19 => SftpError::NotADirectory,
            20 => SftpError::InvalidFilename,
            21 => SftpError::LinkLoop,
            22 => SftpError::CannotDelete,
            23 => SftpError::InvalidParameter,
            24 => SftpError::FileIsADirectory,
            25 => SftpError::ByteRangeLockConflict,
            26 => SftpError::ByteRangeLockRefused,
            27 => SftpError::DeletePending,
            28 => SftpError::FileCorrupt,
            29 => SftpError::OwnerInvalid,
            30 => SftpError::GroupInvalid,
            31 => SftpError::NoMatchingByteRangeLock,
            other => SftpError::Unknown(other),
        }
    }

    /// The protocol status code.
    pub fn code(&self) -> u32 {
        match self {
            SftpError::Ok => 0,
            SftpError::Eof => 1,
            SftpError::NoSuchFile => 2,
            SftpError::PermissionDenied => 3,
            SftpError::Failure => 4,
            SftpError::BadMessage => 5,
            SftpError::NoConnection => 6,
            SftpError::ConnectionLost => 7,
            SftpError::OpUnsupported => 8,
            SftpError::InvalidHandle => 9,
            SftpError::NoSuchPath => 10,
            SftpError::FileAlreadyExists => 11,
            SftpError::WriteProtect => 12,
            SftpError::NoMedia => 13,
            SftpError::NoSpaceOnFilesystem => 14,
            SftpError::QuotaExceeded => 15,
            SftpError::UnknownPrincipal => 16,
            SftpError::LockConflict => 17,
            SftpError::DirNotEmpty => 18,
            SftpError::NotADirectory => 19,
            SftpError::InvalidFilename => 20,
            SftpError::LinkLoop => 21,
            SftpError::CannotDelete => 22,
            SftpError::InvalidParameter => 23,
            SftpError::FileIsADirectory => 24,
            SftpError::ByteRangeLockConflict => 25,
            SftpError::ByteRangeLockRefused => 26,
            SftpError::DeletePending => 27,
            SftpError::FileCorrupt => 28,
            SftpError::OwnerInvalid => 29,
            SftpError::GroupInvalid => 30,
            SftpError::NoMatchingByteRangeLock => 31,
            SftpError::Unknown(code) => *code,
        }
    }

    /// The symbolic protocol name, e.g. `SSH_FX_NO_SUCH_FILE`.
    pub fn name(&self) -> &'static str {
        match self {
            SftpError::Ok => "SSH_FX_OK",
            SftpError::Eof => "SSH_FX_EOF",
            SftpError::NoSuchFile => "SSH_FX_NO_SUCH_FILE",
            SftpError::PermissionDenied => "SSH_FX_PERMISSION_DENIED",
            SftpError::Failure => "SSH_FX_FAILURE",
            SftpError::BadMessage => "SSH_FX_BAD_MESSAGE",
            SftpError::NoConnection => "SSH_FX_NO_CONNECTION",
            SftpError::ConnectionLost => "SSH_FX_CONNECTION_LOST",
            SftpError::OpUnsupported => "SSH_FX_OP_UNSUPPORTED",
            SftpError::InvalidHandle => "SSH_FX_INVALID_HANDLE",
            SftpError::NoSuchPath => "SSH_FX_NO_SUCH_PATH",
            SftpError::FileAlreadyExists => "SSH_FX_FILE_ALREADY_EXISTS",
            SftpError::WriteProtect => "SSH_FX_WRITE_PROTECT",
            SftpError::NoMedia => "SSH_FX_NO_MEDIA",
            SftpError::NoSpaceOnFilesystem => "SSH_FX_NO_SPACE_ON_FILESYSTEM",
            SftpError::QuotaExceeded => "SSH_FX_QUOTA_EXCEEDED",
            SftpError::UnknownPrincipal => "SSH_FX_UNKNOWN_PRINCIPAL",
            SftpError::LockConflict => "SSH_FX_LOCK_CONFLICT",
            SftpError::DirNotEmpty => "SSH_FX_DIR_NOT_EMPTY",
            SftpError::NotADirectory => "SSH_FX_NOT_A_DIRECTORY",
            SftpError::InvalidFilename => "SSH_FX_INVALID_FILENAME",
            SftpError::LinkLoop => "SSH_FX_LINK_LOOP",
            SftpError::CannotDelete => "SSH_FX_CANNOT_DELETE",
            SftpError::InvalidParameter => "SSH_FX_INVALID_PARAMETER",
            SftpError::FileIsADirectory => "SSH_FX_FILE_IS_A_DIRECTORY",
            SftpError::ByteRangeLockConflict => "SSH_FX_BYTE_RANGE_LOCK_CONFLICT",
            SftpError::ByteRangeLockRefused => "SSH_FX_BYTE_RANGE_LOCK_REFUSED",
            SftpError::DeletePending => "SSH_FX_DELETE_PENDING",
            SftpError::FileCorrupt => "SSH_FX_FILE_CORRUPT",
            SftpError::OwnerInvalid => "SSH_FX_OWNER_INVALID",
            SftpError::GroupInvalid => "SSH_FX_GROUP_INVALID",
            SftpError::NoMatchingByteRangeLock => "SSH_FX_NO_MATCHING_BYTE_RANGE_LOCK",
            SftpError::Unknown(_) => "SSH_FX_UNKNOWN",
        }
    }

    /// Whether the code was recognized.
    pub fn is_known(&self) -> bool {
        !matches!(self, SftpError::Unknown(_))
    }
}

impl From<u32> for SftpError {
    fn from(code: u32) -> Self {
        Self::from_code(code)
    }
}
